//! Flash key-value store adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`]. This is the host
//! backend: an in-memory map keyed by `namespace::key`, used by tests and
//! the simulator. The board's flash-sector backend implements the same
//! two traits.
//!
//! - Config validation: all fields are range-checked before persistence.
//! - Namespace isolation: each subsystem uses its own namespace prefix.
//! - Atomic writes: a record is replaced whole or not at all.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use log::info;

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;

const CONFIG_NAMESPACE: &str = "brewos";
const CONFIG_KEY: &str = "syscfg";

/// Largest record a single flash slot holds.
const MAX_BLOB_SIZE: usize = 4000;

#[derive(Default)]
pub struct FlashStore {
    store: RefCell<HashMap<String, Vec<u8>>>,
    fail_writes: Cell<bool>,
}

impl FlashStore {
    pub fn new() -> Self {
        info!("FlashStore: in-memory backend");
        Self::default()
    }

    /// Make every subsequent write fail with [`StorageError::IoError`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::IoError);
        }
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        self.store
            .borrow_mut()
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }
}

impl ConfigPort for FlashStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
        if let Some(bytes) = self.store.borrow().get(&key) {
            let cfg: SystemConfig = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
            cfg.validate().map_err(|_| ConfigError::Corrupted)?;
            info!("FlashStore: loaded config");
            Ok(cfg)
        } else {
            info!("FlashStore: no stored config, using defaults");
            Ok(SystemConfig::default())
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.put(CONFIG_NAMESPACE, CONFIG_KEY, &bytes).map_err(|e| match e {
            StorageError::Full => ConfigError::StorageFull,
            _ => ConfigError::IoError,
        })?;
        info!("FlashStore: config saved");
        Ok(())
    }
}

impl StoragePort for FlashStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let composite = Self::composite_key(namespace, key);
        match self.store.borrow().get(&composite) {
            Some(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let composite = Self::composite_key(namespace, key);
        self.store.borrow_mut().remove(&composite);
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        let composite = Self::composite_key(namespace, key);
        self.store.borrow().contains_key(&composite)
    }
}
