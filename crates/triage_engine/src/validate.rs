use triage_core::{InputItem, InvalidInput};

pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Checks that an item carries a non-empty image no larger than `max_bytes`.
///
/// The format is sniffed from the payload's magic bytes; the file name is not
/// consulted.
pub fn validate_item(item: &InputItem, max_bytes: u64) -> Result<(), InvalidInput> {
    let actual = item.payload.len() as u64;
    if actual == 0 {
        return Err(InvalidInput::EmptyPayload);
    }
    if actual > max_bytes {
        return Err(InvalidInput::TooLarge { max_bytes, actual });
    }
    image::guess_format(&item.payload).map_err(|_| InvalidInput::NotAnImage)?;
    Ok(())
}
