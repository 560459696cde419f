//! crates/homework_core/src/context.rs
//!
//! Per-user UI context: active language and fun mode.
//!
//! Held in process memory only. A restart (or sign-out) resets every user to
//! the defaults.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::i18n::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UiContext {
    pub language: Language,
    pub fun_mode: bool,
}

#[derive(Default)]
pub struct ContextStore {
    contexts: Mutex<HashMap<Uuid, UiContext>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, UiContext>> {
        self.contexts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, user_id: Uuid) -> UiContext {
        self.lock().get(&user_id).copied().unwrap_or_default()
    }

    pub fn update<F>(&self, user_id: Uuid, f: F) -> UiContext
    where
        F: FnOnce(&mut UiContext),
    {
        let mut contexts = self.lock();
        let ctx = contexts.entry(user_id).or_default();
        f(ctx);
        *ctx
    }

    pub fn set_language(&self, user_id: Uuid, language: Language) -> UiContext {
        self.update(user_id, |ctx| ctx.language = language)
    }

    pub fn toggle_fun_mode(&self, user_id: Uuid) -> UiContext {
        self.update(user_id, |ctx| ctx.fun_mode = !ctx.fun_mode)
    }

    pub fn clear(&self, user_id: Uuid) {
        self.lock().remove(&user_id);
    }
}
