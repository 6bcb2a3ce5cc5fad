use chrono::{Datelike, NaiveDate, NaiveDateTime};
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Seek};
use std::path::Path;

/// Files above this size are not opened for EXIF.
pub const MAX_EXIF_FILE_SIZE: u64 = 64 * 1024 * 1024;

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// Read DateTimeOriginal from an image file on disk.
pub fn read_original_date(path: &Path) -> Option<NaiveDate> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!("Could not open {} for EXIF: {}", path.display(), e);
            return None;
        }
    };
    original_date_from(&mut BufReader::new(file))
}

/// Extract DateTimeOriginal from raw image bytes.
pub fn extract_original_date(bytes: &[u8]) -> Option<NaiveDate> {
    original_date_from(&mut Cursor::new(bytes))
}

/// EXIF datetimes have no timezone info - the calendar date is taken as-is.
fn original_date_from<R: BufRead + Seek>(reader: &mut R) -> Option<NaiveDate> {
    let exif = match Reader::new().read_from_container(reader) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::debug!("Could not extract EXIF data: {}", e);
            return None;
        }
    };

    let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;
    let date = match &field.value {
        Value::Ascii(parts) => parts.first().and_then(|raw| {
            exif::DateTime::from_ascii(raw)
                .ok()
                .and_then(|dt| {
                    NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())
                })
                .or_else(|| parse_exif_datetime(&String::from_utf8_lossy(raw)))
        }),
        _ => None,
    }?;

    if is_sane(date) {
        Some(date)
    } else {
        tracing::debug!("Ignoring out-of-range DateTimeOriginal {}", date);
        None
    }
}

/// Lenient parse for cameras that write non-standard separators.
fn parse_exif_datetime(s: &str) -> Option<NaiveDate> {
    let cleaned = s
        .trim_end_matches('\0')
        .trim()
        .replace(['-', '/', '\\', '.'], ":");

    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
        return Some(dt.date());
    }

    NaiveDate::parse_from_str(cleaned.split(' ').next()?, "%Y:%m:%d").ok()
}

fn is_sane(date: NaiveDate) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}
