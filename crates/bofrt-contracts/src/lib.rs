//! Shared, version-pinned ABI identifiers.
//!
//! These constants are the single source of truth for values that cross the
//! module/host boundary: callback category tags, the ABI version reported by
//! the native runtime, and schema strings that appear in machine-readable
//! tool output.

pub const BOFRT_ABI_VERSION: u32 = 1;

pub const CALLBACK_OUTPUT: i32 = 0x00;
pub const CALLBACK_OUTPUT_OEM: i32 = 0x1e;
pub const CALLBACK_ERROR: i32 = 0x0d;

pub const BOFRT_PACK_REPORT_SCHEMA_VERSION: &str = "bofrt.pack.report@0.1.0";
pub const BOFRT_UNPACK_REPORT_SCHEMA_VERSION: &str = "bofrt.unpack.report@0.1.0";
pub const BOFRT_OUTPUT_REPORT_SCHEMA_VERSION: &str = "bofrt.output.report@0.1.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_tags_are_distinct() {
        assert_ne!(CALLBACK_OUTPUT, CALLBACK_OUTPUT_OEM);
        assert_ne!(CALLBACK_OUTPUT, CALLBACK_ERROR);
        assert_ne!(CALLBACK_OUTPUT_OEM, CALLBACK_ERROR);
    }

    #[test]
    fn report_schema_versions_are_distinct() {
        assert_ne!(
            BOFRT_UNPACK_REPORT_SCHEMA_VERSION,
            BOFRT_OUTPUT_REPORT_SCHEMA_VERSION
        );
        assert_ne!(BOFRT_PACK_REPORT_SCHEMA_VERSION, BOFRT_UNPACK_REPORT_SCHEMA_VERSION);
    }
}
