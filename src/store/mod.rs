pub mod kv;
pub mod object;

use std::sync::Arc;

use crate::meta::Meta;
use object::DataStore;

/// Shared handle to both storage planes, threaded through the node, file
/// and pool layers instead of a process-wide singleton.
#[derive(Clone)]
pub struct DataSource {
    pub meta: Arc<Meta>,
    pub data: Arc<DataStore>,
}

impl DataSource {
    pub fn new(meta: Arc<Meta>, data: Arc<DataStore>) -> Self {
        Self { meta, data }
    }
}
