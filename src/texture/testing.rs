//! Recording texture decoder shared by unit tests.

use super::{TextureDecoder, TextureError};
use crate::data::LoadError;
use std::cell::{Cell, RefCell};

/// Decoder whose handles are sequential ids; records every warm and dispose.
#[derive(Default)]
pub(crate) struct RecordingDecoder {
    next_id: Cell<u32>,
    pub warmed: RefCell<Vec<u32>>,
    pub disposed: RefCell<Vec<u32>>,
    pub fail_dispose: Cell<bool>,
    pub fail_decode: Cell<bool>,
}

impl RecordingDecoder {
    /// Allocate a handle without going through `decode`.
    pub fn allocate(&self) -> u32 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    pub fn dispose_count(&self, id: u32) -> usize {
        self.disposed.borrow().iter().filter(|d| **d == id).count()
    }
}

impl TextureDecoder for RecordingDecoder {
    type Handle = u32;

    async fn decode(&self, image: Vec<u8>) -> Result<u32, LoadError> {
        if self.fail_decode.get() || image.is_empty() {
            return Err(LoadError::Decode("empty image".to_string()));
        }
        Ok(self.allocate())
    }

    fn warm(&self, texture: &u32) -> Result<(), TextureError> {
        self.warmed.borrow_mut().push(*texture);
        Ok(())
    }

    fn dispose(&self, texture: &u32) -> Result<(), TextureError> {
        self.disposed.borrow_mut().push(*texture);
        if self.fail_dispose.get() {
            return Err(TextureError::Released);
        }
        Ok(())
    }
}
