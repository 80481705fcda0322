// src/sessions.rs
//! Open editing sessions, one `LabLayout` per lab number. Nothing here touches
//! the store; saving is the handler's job.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use crate::error::{ApiError, ApiResult, LayoutError};
use crate::layout::LabLayout;
use crate::models::LabSnapshot;

#[derive(Default)]
pub struct LabSessions {
    labs: Mutex<HashMap<String, LabLayout>>,
}

impl LabSessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, HashMap<String, LabLayout>>> {
        self.labs
            .lock()
            .map_err(|_| ApiError::InternalServerError("Session store lock poisoned".to_string()))
    }

    /// Stores a session, replacing any open one for the same lab.
    /// Returns true when an open session was discarded.
    pub fn open(&self, layout: LabLayout) -> ApiResult<bool> {
        let mut labs = self.lock()?;
        let replaced = labs.insert(layout.lab_number().to_string(), layout).is_some();
        Ok(replaced)
    }

    pub fn is_open(&self, lab_number: &str) -> ApiResult<bool> {
        Ok(self.lock()?.contains_key(lab_number))
    }

    pub fn close(&self, lab_number: &str) -> ApiResult<bool> {
        Ok(self.lock()?.remove(lab_number).is_some())
    }

    pub fn open_labs(&self) -> ApiResult<Vec<String>> {
        let mut labs: Vec<String> = self.lock()?.keys().cloned().collect();
        labs.sort();
        Ok(labs)
    }

    pub fn read<F, R>(&self, lab_number: &str, f: F) -> ApiResult<R>
    where
        F: FnOnce(&LabLayout) -> R,
    {
        let labs = self.lock()?;
        let layout = labs
            .get(lab_number)
            .ok_or_else(|| ApiError::lab_not_open(lab_number))?;
        Ok(f(layout))
    }

    /// Runs one synchronous mutation against an open session.
    pub fn update<F, R>(&self, lab_number: &str, f: F) -> ApiResult<R>
    where
        F: FnOnce(&mut LabLayout) -> Result<R, LayoutError>,
    {
        let mut labs = self.lock()?;
        let layout = labs
            .get_mut(lab_number)
            .ok_or_else(|| ApiError::lab_not_open(lab_number))?;
        Ok(f(layout)?)
    }

    /// Cloned so the lock is not held across the store write.
    pub fn snapshot(&self, lab_number: &str) -> ApiResult<LabSnapshot> {
        self.read(lab_number, LabLayout::snapshot)
    }
}
