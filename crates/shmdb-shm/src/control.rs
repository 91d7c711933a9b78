//! One-shot control messages carried in a single region.
//!
//! The poster encodes a message at offset 1 and raises a message flag; the
//! receiver decodes it and overwrites the flag with a [`Status`]. The poster
//! must not touch the region again until it observes that status.

use shmdb_wire::{Decoder, EMPTY, Encoder, Status, WireResult};

use crate::region::{Region, RegionHandle};

#[derive(Debug)]
pub struct ControlRegion {
    region: Region,
}

impl ControlRegion {
    pub fn new(region: Region) -> Self {
        Self { region }
    }

    pub fn handle(&self) -> &RegionHandle {
        self.region.handle()
    }

    /// Current flag, read with acquire ordering.
    pub fn flag(&self) -> u8 {
        self.region.load_flag()
    }

    /// The status the receiver acknowledged with, if any.
    pub fn status(&self) -> Option<Status> {
        Status::try_from(self.flag()).ok()
    }

    /// Encodes a message and raises `flag`.
    ///
    /// On encode failure the flag is left untouched.
    pub fn post(
        &mut self,
        flag: u8,
        encode: impl FnOnce(&mut Encoder<'_>) -> WireResult<()>,
    ) -> WireResult<()> {
        // SAFETY: nothing is posted, so no receiver reads the payload until
        // the release store below.
        let payload = unsafe { self.region.payload_mut() };
        encode(&mut Encoder::new(payload))?;
        self.region.store_flag(flag);
        Ok(())
    }

    /// Decodes the posted message, or returns `None` if nothing is posted.
    pub fn read<T>(
        &self,
        decode: impl FnOnce(&mut Decoder<'_>) -> WireResult<T>,
    ) -> Option<WireResult<T>> {
        if self.flag() == EMPTY {
            return None;
        }
        // SAFETY: the acquire load above observed the poster's release
        // store; the poster waits for an acknowledgement before writing.
        let payload = unsafe { self.region.payload() };
        Some(decode(&mut Decoder::new(payload)))
    }

    /// Replaces the message flag with `status`, handing the region back to
    /// the poster.
    pub fn acknowledge(&self, status: Status) {
        self.region.store_flag(status.as_byte());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnonymousRegions, RegionProvider};

    #[test]
    fn post_read_acknowledge() {
        let provider = AnonymousRegions::new();
        let handle = provider.allocate(64).unwrap();
        let mut poster = ControlRegion::new(provider.map(&handle).unwrap());
        let receiver = ControlRegion::new(provider.map(&handle).unwrap());

        assert!(receiver.read(|dec| dec.take_string()).is_none());

        poster.post(b'S', |enc| enc.put_str("hello")).unwrap();
        assert_eq!(receiver.flag(), b'S');
        assert_eq!(poster.status(), None);
        assert_eq!(receiver.read(|dec| dec.take_string()).unwrap().unwrap(), "hello");

        receiver.acknowledge(Status::Ok);
        assert_eq!(poster.status(), Some(Status::Ok));
    }

    #[test]
    fn oversized_post_leaves_flag_empty() {
        let provider = AnonymousRegions::new();
        let mut control = ControlRegion::new(provider.allocate_mapped(8).unwrap());

        assert!(control.post(b'S', |enc| enc.put_str("too long")).is_err());
        assert_eq!(control.flag(), EMPTY);
    }
}
