//! Typed operations against the metadata store.
//!
//! The metadata engine only ever goes through [`KvStore`], so tests can run
//! against [`MemoryKv`] while a mount talks to Redis.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};

use crate::errors::KvError;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError>;
    async fn del(&self, key: &str) -> Result<(), KvError>;
    async fn incr(&self, key: &str) -> Result<i64, KvError>;
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, KvError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, KvError>;
    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<(), KvError>;
    async fn hdel(&self, key: &str, field: &str) -> Result<(), KvError>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, KvError>;
    async fn hlen(&self, key: &str) -> Result<u64, KvError>;

    async fn rpush(&self, key: &str, value: &[u8]) -> Result<u64, KvError>;
    async fn lset(&self, key: &str, index: i64, value: &[u8]) -> Result<(), KvError>;
    async fn lindex(&self, key: &str, index: i64) -> Result<Option<Vec<u8>>, KvError>;
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError>;
    async fn llen(&self, key: &str) -> Result<u64, KvError>;
    async fn rpop(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;
}

/// Redis-backed driver used by a real mount.
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    /// Connect to `url` (`redis://[:password@]host[:port][/db]`). A password
    /// may also come from `REDIS_PASSWORD` when the URL carries none.
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        use redis::IntoConnectionInfo;

        let mut info = url
            .into_connection_info()
            .map_err(|e| KvError::Transport(format!("parse {url}: {e}")))?;
        if info.redis.password.is_none() {
            if let Ok(password) = std::env::var("REDIS_PASSWORD") {
                if !password.is_empty() {
                    info.redis.password = Some(password);
                }
            }
        }

        let client = redis::Client::open(info)?;
        let config = ConnectionManagerConfig::new().set_number_of_retries(3);
        let conn = client.get_connection_manager_with_config(config).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.conn.clone().get(key).await?)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
        let _: () = self.conn.clone().set(key, value).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        let _: () = self.conn.clone().del(key).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        Ok(self.conn.clone().incr(key, 1i64).await?)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, KvError> {
        Ok(self.conn.clone().incr(key, delta).await?)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.conn.clone().hget(key, field).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<(), KvError> {
        let _: () = self.conn.clone().hset(key, field, value).await?;
        Ok(())
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), KvError> {
        let _: () = self.conn.clone().hdel(key, field).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, KvError> {
        Ok(self.conn.clone().hgetall(key).await?)
    }

    async fn hlen(&self, key: &str) -> Result<u64, KvError> {
        let len: i64 = self.conn.clone().hlen(key).await?;
        Ok(len as u64)
    }

    async fn rpush(&self, key: &str, value: &[u8]) -> Result<u64, KvError> {
        let len: i64 = self.conn.clone().rpush(key, value).await?;
        Ok(len as u64)
    }

    async fn lset(&self, key: &str, index: i64, value: &[u8]) -> Result<(), KvError> {
        let _: () = self.conn.clone().lset(key, index as isize, value).await?;
        Ok(())
    }

    async fn lindex(&self, key: &str, index: i64) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.conn.clone().lindex(key, index as isize).await?)
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        let _: () = self
            .conn
            .clone()
            .ltrim(key, start as isize, stop as isize)
            .await?;
        Ok(())
    }

    async fn llen(&self, key: &str) -> Result<u64, KvError> {
        let len: i64 = self.conn.clone().llen(key).await?;
        Ok(len as u64)
    }

    async fn rpop(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self
            .conn
            .clone()
            .rpop(key, None::<NonZeroUsize>)
            .await?)
    }
}

enum Value {
    Raw(Vec<u8>),
    Hash(HashMap<String, Vec<u8>>),
    List(Vec<Vec<u8>>),
}

/// In-process driver backing the test suite, mirroring the Redis command
/// semantics the engine relies on (including WRONGTYPE on kind mismatch).
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn wrong_type() -> KvError {
        KvError::Transport("WRONGTYPE operation against a key holding the wrong kind of value".into())
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            None => Ok(None),
            Some(Value::Raw(data)) => Ok(Some(data.clone())),
            Some(_) => Err(Self::wrong_type()),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), Value::Raw(value.to_vec()));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        self.incr_by(key, 1).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, KvError> {
        let mut entries = self.entries.lock().unwrap();
        let current = match entries.get(key) {
            None => 0,
            Some(Value::Raw(data)) => std::str::from_utf8(data)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| {
                    KvError::Transport("value is not an integer or out of range".into())
                })?,
            Some(_) => return Err(Self::wrong_type()),
        };
        let next = current + delta;
        entries.insert(key.to_string(), Value::Raw(next.to_string().into_bytes()));
        Ok(next)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, KvError> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            None => Ok(None),
            Some(Value::Hash(map)) => Ok(map.get(field).cloned()),
            Some(_) => Err(Self::wrong_type()),
        }
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<(), KvError> {
        let mut entries = self.entries.lock().unwrap();
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()))
        {
            Value::Hash(map) => {
                map.insert(field.to_string(), value.to_vec());
                Ok(())
            }
            _ => Err(Self::wrong_type()),
        }
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), KvError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            None => Ok(()),
            Some(Value::Hash(map)) => {
                map.remove(field);
                Ok(())
            }
            Some(_) => Err(Self::wrong_type()),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, KvError> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(map)) => Ok(map.clone()),
            Some(_) => Err(Self::wrong_type()),
        }
    }

    async fn hlen(&self, key: &str) -> Result<u64, KvError> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            None => Ok(0),
            Some(Value::Hash(map)) => Ok(map.len() as u64),
            Some(_) => Err(Self::wrong_type()),
        }
    }

    async fn rpush(&self, key: &str, value: &[u8]) -> Result<u64, KvError> {
        let mut entries = self.entries.lock().unwrap();
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Value::List(Vec::new()))
        {
            Value::List(list) => {
                list.push(value.to_vec());
                Ok(list.len() as u64)
            }
            _ => Err(Self::wrong_type()),
        }
    }

    async fn lset(&self, key: &str, index: i64, value: &[u8]) -> Result<(), KvError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(Value::List(list)) => {
                let slot = list
                    .get_mut(index as usize)
                    .ok_or_else(|| KvError::Transport("index out of range".into()))?;
                *slot = value.to_vec();
                Ok(())
            }
            Some(_) => Err(Self::wrong_type()),
            None => Err(KvError::Transport("no such key".into())),
        }
    }

    async fn lindex(&self, key: &str, index: i64) -> Result<Option<Vec<u8>>, KvError> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            None => Ok(None),
            Some(Value::List(list)) => Ok(list.get(index as usize).cloned()),
            Some(_) => Err(Self::wrong_type()),
        }
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            None => Ok(()),
            Some(Value::List(list)) => {
                let len = list.len() as i64;
                let start = if start < 0 { (len + start).max(0) } else { start.min(len) };
                let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
                if start > stop {
                    list.clear();
                } else {
                    *list = list[start as usize..=(stop as usize)].to_vec();
                }
                Ok(())
            }
            Some(_) => Err(Self::wrong_type()),
        }
    }

    async fn llen(&self, key: &str) -> Result<u64, KvError> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len() as u64),
            Some(_) => Err(Self::wrong_type()),
        }
    }

    async fn rpop(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            None => Ok(None),
            Some(Value::List(list)) => Ok(list.pop()),
            Some(_) => Err(Self::wrong_type()),
        }
    }
}
