//! Publication of the rendered script into the guest-visible virtual file.
//!
//! The script is composed once, in UTF-8. What the guest reads is that text
//! transcoded into its active code page; [`PublishCache`] tracks which code
//! page the published bytes were generated for so a code-page change only
//! re-runs the transcoder when it would actually produce different bytes.

/// Name of the virtual file exposed to the guest.
pub const AUTOEXEC_FILE_NAME: &str = "AUTOEXEC.BAT";

/// Converts rendered UTF-8 script text into a target code page.
///
/// Implementations must be deterministic; characters the page cannot
/// represent are replaced by the implementation's fallback.
pub trait CodePageTranscoder {
    fn transcode(&self, utf8: &str, code_page: u16) -> Vec<u8>;
}

impl<F> CodePageTranscoder for F
where
    F: Fn(&str, u16) -> Vec<u8>,
{
    fn transcode(&self, utf8: &str, code_page: u16) -> Vec<u8> {
        self(utf8, code_page)
    }
}

/// [`CodePageTranscoder`] backed by the `strato-codepage` tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct DosTranscoder;

impl CodePageTranscoder for DosTranscoder {
    fn transcode(&self, utf8: &str, code_page: u16) -> Vec<u8> {
        strato_codepage::encode(utf8, code_page, strato_codepage::FALLBACK_BYTE)
    }
}

/// Virtual-file service provided by the surrounding emulator: `register` is
/// called for the first publication, `update` for every refresh of the same
/// file.
pub trait BootScriptSink {
    fn register(&mut self, name: &str, bytes: Vec<u8>);
    fn update(&mut self, name: &str, bytes: Vec<u8>);
}

/// Tracks the published state of the boot script: whether the virtual file
/// exists yet, and which code page its bytes were transcoded for.
#[derive(Debug, Default)]
pub struct PublishCache {
    registered: bool,
    code_page: u16,
}

impl PublishCache {
    /// Whether the virtual file has ever been published.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Code page of the currently published bytes, if any.
    pub fn code_page(&self) -> Option<u16> {
        self.registered.then_some(self.code_page)
    }

    /// Transcodes `script_utf8` into `code_page` and publishes the result,
    /// registering the virtual file on first use and updating it in place
    /// afterwards.
    pub fn publish(
        &mut self,
        script_utf8: &str,
        code_page: u16,
        transcoder: &dyn CodePageTranscoder,
        sink: &mut dyn BootScriptSink,
    ) {
        let bytes = transcoder.transcode(script_utf8, code_page);
        if self.registered {
            sink.update(AUTOEXEC_FILE_NAME, bytes);
        } else {
            sink.register(AUTOEXEC_FILE_NAME, bytes);
            self.registered = true;
        }
        self.code_page = code_page;
    }

    /// Reacts to a change of the guest's active code page. Does nothing when
    /// no script has ever been published, or when the published bytes were
    /// already generated for `code_page` (the transcoder is not invoked in
    /// either case).
    pub fn handle_code_page_change(
        &mut self,
        script_utf8: &str,
        code_page: u16,
        transcoder: &dyn CodePageTranscoder,
        sink: &mut dyn BootScriptSink,
    ) {
        if !self.registered || self.code_page == code_page {
            return;
        }
        self.publish(script_utf8, code_page, transcoder, sink);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        registers: Vec<Vec<u8>>,
        updates: Vec<Vec<u8>>,
    }

    impl BootScriptSink for RecordingSink {
        fn register(&mut self, name: &str, bytes: Vec<u8>) {
            assert_eq!(name, AUTOEXEC_FILE_NAME);
            self.registers.push(bytes);
        }

        fn update(&mut self, name: &str, bytes: Vec<u8>) {
            assert_eq!(name, AUTOEXEC_FILE_NAME);
            self.updates.push(bytes);
        }
    }

    fn counting_transcoder(calls: &Cell<usize>) -> impl CodePageTranscoder + '_ {
        move |utf8: &str, code_page: u16| {
            calls.set(calls.get() + 1);
            strato_codepage::encode(utf8, code_page, b'?')
        }
    }

    #[test]
    fn first_publish_registers_then_updates() {
        let mut cache = PublishCache::default();
        let mut sink = RecordingSink::default();

        cache.publish("DIR\r\n", 437, &DosTranscoder, &mut sink);
        cache.publish("CLS\r\n", 437, &DosTranscoder, &mut sink);

        assert_eq!(sink.registers, [b"DIR\r\n".to_vec()]);
        assert_eq!(sink.updates, [b"CLS\r\n".to_vec()]);
        assert_eq!(cache.code_page(), Some(437));
    }

    #[test]
    fn code_page_change_before_any_publish_is_a_no_op() {
        let calls = Cell::new(0);
        let mut cache = PublishCache::default();
        let mut sink = RecordingSink::default();

        cache.handle_code_page_change("DIR\r\n", 850, &counting_transcoder(&calls), &mut sink);

        assert_eq!(calls.get(), 0);
        assert!(sink.registers.is_empty());
        assert!(sink.updates.is_empty());
        assert!(!cache.is_registered());
    }

    #[test]
    fn unchanged_code_page_skips_transcoding() {
        let calls = Cell::new(0);
        let mut cache = PublishCache::default();
        let mut sink = RecordingSink::default();
        let transcoder = counting_transcoder(&calls);

        cache.publish("DIR\r\n", 437, &transcoder, &mut sink);
        assert_eq!(calls.get(), 1);

        cache.handle_code_page_change("DIR\r\n", 437, &transcoder, &mut sink);
        assert_eq!(calls.get(), 1);
        assert!(sink.updates.is_empty());
    }

    #[test]
    fn new_code_page_republishes_the_same_text() {
        let mut cache = PublishCache::default();
        let mut sink = RecordingSink::default();

        cache.publish("REM caf\u{00E9}\r\n", 437, &DosTranscoder, &mut sink);
        cache.handle_code_page_change("REM caf\u{00E9}\r\n", 850, &DosTranscoder, &mut sink);

        assert_eq!(sink.registers, [b"REM caf\x82\r\n".to_vec()]);
        assert_eq!(sink.updates, [b"REM caf\x82\r\n".to_vec()]);
        assert_eq!(cache.code_page(), Some(850));
    }
}
