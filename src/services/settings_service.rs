use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::LibraryResult;
use crate::models::book::SortKey;

pub const THEME_KEY: &str = "theme";
pub const SORT_KEY: &str = "sort";

const THEMES: &[&str] = &["pastel_dark", "dark", "light"];
const DEFAULT_THEME: &str = "pastel_dark";

/// Opaque key/value storage for presentation preferences.
pub trait SettingsStore {
    fn get_setting(&self, key: &str, default: &str) -> LibraryResult<String>;
    fn set_setting(&self, key: &str, value: &str) -> LibraryResult<()>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for &S {
    fn get_setting(&self, key: &str, default: &str) -> LibraryResult<String> {
        (**self).get_setting(key, default)
    }

    fn set_setting(&self, key: &str, value: &str) -> LibraryResult<()> {
        (**self).set_setting(key, value)
    }
}

#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl SettingsStore for MemorySettings {
    fn get_setting(&self, key: &str, default: &str) -> LibraryResult<String> {
        let values = self
            .values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string()))
    }

    fn set_setting(&self, key: &str, value: &str) -> LibraryResult<()> {
        let mut values = self
            .values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub struct SettingsService<S> {
    store: S,
}

impl<S: SettingsStore> SettingsService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, key: &str, default: &str) -> LibraryResult<String> {
        self.store.get_setting(key, default)
    }

    pub fn set(&self, key: &str, value: &str) -> LibraryResult<()> {
        self.store.set_setting(key, value)
    }

    pub fn theme(&self) -> LibraryResult<String> {
        let stored = self.store.get_setting(THEME_KEY, DEFAULT_THEME)?;
        if THEMES.contains(&stored.as_str()) {
            Ok(stored)
        } else {
            Ok(DEFAULT_THEME.to_string())
        }
    }

    pub fn set_theme(&self, theme: &str) -> LibraryResult<()> {
        self.store.set_setting(THEME_KEY, theme)
    }

    pub fn sort_key(&self) -> LibraryResult<SortKey> {
        let stored = self
            .store
            .get_setting(SORT_KEY, &SortKey::default().to_string())?;
        Ok(stored.parse().unwrap_or_default())
    }

    pub fn set_sort_key(&self, sort: SortKey) -> LibraryResult<()> {
        self.store.set_setting(SORT_KEY, &sort.to_string())
    }
}
