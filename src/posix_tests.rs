#[cfg(test)]
mod tests {
    use crate::fs::node::NodeKind;
    use crate::fs::test_support::test_fs;
    use crate::fs::GitFs;
    use crate::meta::{align4k, FileType, Ino, SetAttrRequest, ROOT_INODE};
    use crate::page::PAGE_SIZE;

    const PAGE: u64 = PAGE_SIZE as u64;

    async fn create_file(fs: &GitFs, parent: Ino, name: &str) -> Ino {
        let (_, ino) = fs
            .source()
            .meta
            .mknod(parent, FileType::Regular, name, 0o644, 0)
            .await
            .unwrap();
        ino
    }

    #[tokio::test]
    async fn mkdir_updates_link_counts() {
        let fs = test_fs().await;
        let meta = &fs.source().meta;

        let (attr, ino) = meta
            .mknod(ROOT_INODE, FileType::Directory, "a", 0o755, 0)
            .await
            .unwrap();
        assert_eq!(attr.nlink, 2);

        let dentry = meta.get_dentry(ROOT_INODE, "a").await.unwrap().unwrap();
        assert_eq!(dentry.ino, ino);
        assert_eq!(meta.getattr(ROOT_INODE).await.unwrap().nlink, 3);
    }

    #[tokio::test]
    async fn write_close_reopen_reads_back() {
        let fs = test_fs().await;
        let ino = create_file(&fs, ROOT_INODE, "b").await;

        let fh = fs.open_file(ino).await.unwrap();
        let file = fs.handle(fh).unwrap();
        assert_eq!(file.write(b"test message", 0).await.unwrap(), 12);
        // Kernel close: flush, then release.
        file.flush().await.unwrap();
        fs.release_handle(fh).await.unwrap();

        assert_eq!(fs.source().meta.getattr(ino).await.unwrap().length, 12);

        let fh = fs.open_file(ino).await.unwrap();
        let file = fs.handle(fh).unwrap();
        let mut buf = vec![0u8; 64];
        let n = file.read(&mut buf, 0).await.unwrap();
        assert_eq!(&buf[..n], b"test message");
        fs.release_handle(fh).await.unwrap();
    }

    #[tokio::test]
    async fn multi_page_file_round_trips() {
        let fs = test_fs().await;
        let ino = create_file(&fs, ROOT_INODE, "big").await;
        let body = vec![b'x'; 2 * PAGE as usize];

        let fh = fs.open_file(ino).await.unwrap();
        let file = fs.handle(fh).unwrap();
        file.write(&body, 0).await.unwrap();
        file.fsync().await.unwrap();

        let meta = &fs.source().meta;
        let length = meta.getattr(ino).await.unwrap().length;
        assert_eq!(length, 2 * PAGE);
        // Chunk list length tracks ceil(length / page size).
        assert_eq!(meta.chunk_count(ino).await.unwrap(), length.div_ceil(PAGE));
        for page in 0..2 {
            let chunk = meta.get_chunk_meta(ino, page).await.unwrap().unwrap();
            assert_eq!(chunk.length, PAGE);
        }

        fs.release_handle(fh).await.unwrap();

        let fh = fs.open_file(ino).await.unwrap();
        let file = fs.handle(fh).unwrap();
        let mut buf = vec![0u8; 2 * PAGE as usize];
        let n = file.read(&mut buf, 0).await.unwrap();
        assert_eq!(n, body.len());
        assert_eq!(buf, body);
        fs.release_handle(fh).await.unwrap();
    }

    #[tokio::test]
    async fn head_lives_in_the_ref_store_not_the_object_store() {
        let fs = test_fs().await;
        let meta = &fs.source().meta;

        let (_, git_dir) = meta
            .mknod(ROOT_INODE, FileType::Directory, ".git", 0o755, 0)
            .await
            .unwrap();
        let kind = fs.node_kind(ROOT_INODE).child(".git", FileType::Directory);
        assert_eq!(kind, NodeKind::GitRepo);
        fs.register_node(git_dir, kind, ROOT_INODE);

        let head = create_file(&fs, git_dir, "HEAD").await;
        let kind = fs.node_kind(git_dir).child("HEAD", FileType::Regular);
        assert_eq!(kind, NodeKind::GitSymRef);
        fs.register_node(head, kind, git_dir);

        let body = b"ref: refs/heads/main\n";
        let fh = fs.open_ref_file(head).await.unwrap();
        let file = fs.handle(fh).unwrap();
        file.write(body, 0).await.unwrap();
        file.fsync().await.unwrap();
        fs.release_handle(fh).await.unwrap();

        // Whole value under r<ino>, nothing in the chunk map or bucket.
        assert_eq!(meta.ref_get(head).await.unwrap().unwrap(), body);
        assert_eq!(meta.chunk_count(head).await.unwrap(), 0);
        assert!(fs.source().data.list("chunks", 1).await.unwrap().is_empty());
        assert_eq!(meta.getattr(head).await.unwrap().length, body.len() as u64);

        let fh = fs.open_ref_file(head).await.unwrap();
        let file = fs.handle(fh).unwrap();
        let mut buf = vec![0u8; 64];
        let n = file.read(&mut buf, 0).await.unwrap();
        assert_eq!(&buf[..n], body);
        fs.release_handle(fh).await.unwrap();
    }

    #[tokio::test]
    async fn rename_keeps_size_and_drops_old_name() {
        let fs = test_fs().await;
        let ino = create_file(&fs, ROOT_INODE, "x").await;

        let fh = fs.open_file(ino).await.unwrap();
        let file = fs.handle(fh).unwrap();
        file.write(b"hello", 0).await.unwrap();
        file.flush().await.unwrap();
        fs.release_handle(fh).await.unwrap();

        let meta = &fs.source().meta;
        meta.rename(ROOT_INODE, "x", ROOT_INODE, "y").await.unwrap();

        assert!(meta.get_dentry(ROOT_INODE, "x").await.unwrap().is_none());
        let dentry = meta.get_dentry(ROOT_INODE, "y").await.unwrap().unwrap();
        assert_eq!(dentry.ino, ino);
        assert_eq!(meta.getattr(ino).await.unwrap().length, 5);
    }

    #[tokio::test]
    async fn shrinking_setattr_trims_to_the_byte() {
        let fs = test_fs().await;
        let ino = create_file(&fs, ROOT_INODE, "tmp").await;
        let new_size = PAGE + 100;

        let fh = fs.open_file(ino).await.unwrap();
        let file = fs.handle(fh).unwrap();
        file.write(&vec![b'z'; 3 * PAGE as usize], 0).await.unwrap();
        file.fsync().await.unwrap();

        file.setattr(&SetAttrRequest {
            size: Some(new_size),
            ..Default::default()
        })
        .await
        .unwrap();
        file.fsync().await.unwrap();

        let meta = &fs.source().meta;
        assert_eq!(meta.getattr(ino).await.unwrap().length, new_size);
        assert_eq!(meta.chunk_count(ino).await.unwrap(), 2);
        assert_eq!(
            meta.get_chunk_meta(ino, 1).await.unwrap().unwrap().length,
            100
        );

        let mut buf = vec![0u8; (new_size + PAGE) as usize];
        let n = file.read(&mut buf, 0).await.unwrap();
        assert_eq!(n as u64, new_size);
        fs.release_handle(fh).await.unwrap();
    }

    #[tokio::test]
    async fn unlink_after_close_frees_space_and_record() {
        let fs = test_fs().await;
        let ino = create_file(&fs, ROOT_INODE, "doomed").await;

        let fh = fs.open_file(ino).await.unwrap();
        let file = fs.handle(fh).unwrap();
        file.write(&vec![b'd'; 5000], 0).await.unwrap();
        file.flush().await.unwrap();
        fs.release_handle(fh).await.unwrap();

        let meta = &fs.source().meta;
        assert_eq!(meta.used_space().await.unwrap(), align4k(5000));

        meta.unlink(ROOT_INODE, "doomed").await.unwrap();
        assert!(meta.getattr(ino).await.is_err());
        assert_eq!(meta.used_space().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn statfs_counters_line_up() {
        let fs = test_fs().await;
        let meta = &fs.source().meta;

        let ino = create_file(&fs, ROOT_INODE, "f").await;
        let fh = fs.open_file(ino).await.unwrap();
        let file = fs.handle(fh).unwrap();
        file.write(&vec![b'q'; PAGE_SIZE], 0).await.unwrap();
        file.flush().await.unwrap();
        fs.release_handle(fh).await.unwrap();

        let total_inodes = meta.total_inode_count().await.unwrap();
        let cur = meta.cur_inode_count().await.unwrap();
        assert_eq!(cur, 2);
        assert!(total_inodes > cur);
        assert_eq!(meta.used_space().await.unwrap(), PAGE);
        assert_eq!(meta.total_space().await.unwrap(), 1 << 30);
    }
}
