//! In-memory render backend
//!
//! Stores uploaded buffers and logs every command in order. Used by the headless
//! demo and by tests that assert on draw ordering.

use super::{BufferId, BufferUpload, ClearMask, DrawCall, RenderBackend, Technique};
use crate::error::{VisError, VisResult};
use rustc_hash::{FxHashMap, FxHashSet};

/// One command received by a [`RecordingBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedCommand {
    /// Buffer upload and its size in bytes
    Upload {
        /// Target buffer
        buffer: BufferId,
        /// Bytes written
        len: usize,
    },
    /// Framebuffer clear
    Clear(ClearMask),
    /// Draw call
    Draw(DrawCall),
}

/// Backend that records instead of rendering
#[derive(Debug, Default)]
pub struct RecordingBackend {
    buffers: FxHashMap<BufferId, Vec<u8>>,
    commands: Vec<RecordedCommand>,
    failing: FxHashSet<Technique>,
    failing_uploads: FxHashSet<BufferId>,
}

impl RecordingBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every draw of `technique` fail
    pub fn fail_on(&mut self, technique: Technique) {
        self.failing.insert(technique);
    }

    /// Make every upload to `buffer` fail
    pub fn fail_upload(&mut self, buffer: BufferId) {
        self.failing_uploads.insert(buffer);
    }

    /// Stop failing draws and uploads
    pub fn clear_failures(&mut self) {
        self.failing.clear();
        self.failing_uploads.clear();
    }

    /// Latest contents of a buffer
    #[must_use]
    pub fn buffer(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(Vec::as_slice)
    }

    /// Commands received so far
    #[must_use]
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Drain the command log, keeping buffer contents
    pub fn take_commands(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Draw calls so far, in order
    pub fn draw_calls(&self) -> impl Iterator<Item = &DrawCall> + '_ {
        self.commands.iter().filter_map(|command| match command {
            RecordedCommand::Draw(call) => Some(call),
            RecordedCommand::Upload { .. } | RecordedCommand::Clear(_) => None,
        })
    }
}

impl BufferUpload for RecordingBackend {
    fn upload(&mut self, buffer: BufferId, bytes: &[u8]) -> VisResult<()> {
        if self.failing_uploads.contains(&buffer) {
            return Err(VisError::Backend {
                technique: buffer.technique(),
                message: format!("upload of {buffer:?} rejected by recording backend"),
            });
        }
        self.buffers.insert(buffer, bytes.to_vec());
        self.commands.push(RecordedCommand::Upload {
            buffer,
            len: bytes.len(),
        });
        Ok(())
    }
}

impl RenderBackend for RecordingBackend {
    fn clear(&mut self, mask: ClearMask) -> VisResult<()> {
        self.commands.push(RecordedCommand::Clear(mask));
        Ok(())
    }

    fn draw(&mut self, call: DrawCall) -> VisResult<()> {
        if self.failing.contains(&call.technique) {
            return Err(VisError::Backend {
                technique: call.technique,
                message: "draw rejected by recording backend".to_string(),
            });
        }
        self.commands.push(RecordedCommand::Draw(call));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Primitive;

    fn call(technique: Technique) -> DrawCall {
        DrawCall {
            technique,
            primitive: Primitive::Triangles,
            index_count: 6,
            instance_count: 1,
        }
    }

    #[test]
    fn test_commands_are_recorded_in_order() {
        let mut backend = RecordingBackend::new();
        backend.clear(ClearMask::COLOR).unwrap();
        backend.upload(BufferId::ScalarColors, &[1, 2, 3]).unwrap();
        backend.draw(call(Technique::ScalarData)).unwrap();

        assert_eq!(
            backend.commands(),
            &[
                RecordedCommand::Clear(ClearMask::COLOR),
                RecordedCommand::Upload {
                    buffer: BufferId::ScalarColors,
                    len: 3
                },
                RecordedCommand::Draw(call(Technique::ScalarData)),
            ]
        );
        assert_eq!(backend.buffer(BufferId::ScalarColors), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_failing_technique_is_not_recorded() {
        let mut backend = RecordingBackend::new();
        backend.fail_on(Technique::Isolines);
        let err = backend.draw(call(Technique::Isolines)).unwrap_err();
        assert!(matches!(
            err,
            VisError::Backend {
                technique: Technique::Isolines,
                ..
            }
        ));
        backend.draw(call(Technique::ScalarData)).unwrap();
        assert_eq!(backend.draw_calls().count(), 1);

        backend.clear_failures();
        backend.draw(call(Technique::Isolines)).unwrap();
        assert_eq!(backend.draw_calls().count(), 2);
    }

    #[test]
    fn test_failing_upload_names_its_technique() {
        let mut backend = RecordingBackend::new();
        backend.fail_upload(BufferId::LicNoise);
        let err = backend.upload(BufferId::LicNoise, &[0; 4]).unwrap_err();
        assert!(matches!(
            err,
            VisError::Backend {
                technique: Technique::Lic,
                ..
            }
        ));
        assert!(backend.buffer(BufferId::LicNoise).is_none());
        assert!(backend.commands().is_empty());

        backend.clear_failures();
        backend.upload(BufferId::LicNoise, &[0; 4]).unwrap();
        assert_eq!(backend.commands().len(), 1);
    }

    #[test]
    fn test_take_commands_keeps_buffers() {
        let mut backend = RecordingBackend::new();
        backend.upload(BufferId::LicNoise, &[9; 4]).unwrap();
        assert_eq!(backend.take_commands().len(), 1);
        assert!(backend.commands().is_empty());
        assert_eq!(backend.buffer(BufferId::LicNoise).map(<[u8]>::len), Some(4));
    }
}
