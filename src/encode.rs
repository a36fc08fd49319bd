//! Canonical fixed-width term encoding.
//!
//! Every RDF term maps to a vector of `W` integers (default 128). Slot 0 is a
//! discriminant identifying the term kind or datatype family, the remaining
//! slots hold a datatype-specific, zero-padded payload. The encoding is total
//! and injective: equal terms encode identically, distinct terms never
//! collide, and a payload that does not fit the slot budget is an error, never
//! a truncation. `decode_term` is the exact inverse for every supported
//! family.

use spargebra::term::{BlankNode, Literal, NamedNode, Term};

use crate::error::EncodeError;

/// Default encoded-term width, in slots.
pub const DEFAULT_TERM_WIDTH: usize = 128;

/// Slots reserved for the language tag of a language-tagged literal.
pub const LANG_TAG_SLOTS: usize = 8;

/// XSD datatype namespace.
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// Term-kind / datatype-family discriminants (slot 0).
pub mod disc {
    pub const IRI: i128 = 0;
    pub const BLANK: i128 = 1;
    pub const LANG_LITERAL: i128 = 2;
    pub const STRING: i128 = 3;
    pub const BOOLEAN: i128 = 4;
    pub const INTEGER: i128 = 5;
    pub const DECIMAL: i128 = 6;
    pub const FLOAT: i128 = 7;
    pub const DOUBLE: i128 = 8;
    pub const DATE_TIME: i128 = 9;
    pub const DATE: i128 = 10;
    pub const TIME: i128 = 11;
    pub const G_YEAR: i128 = 12;
    pub const G_MONTH: i128 = 13;
    pub const G_DAY: i128 = 14;
    pub const G_YEAR_MONTH: i128 = 15;
    pub const G_MONTH_DAY: i128 = 16;
    pub const DURATION: i128 = 17;
    pub const DAY_TIME_DURATION: i128 = 18;
    pub const YEAR_MONTH_DURATION: i128 = 19;
    pub const OTHER_LITERAL: i128 = 20;
    /// Untyped plain literal. RDF 1.1 folds these into `xsd:string`, so the
    /// encoder never emits this discriminant; the decoder accepts it.
    pub const PLAIN_LITERAL: i128 = 21;
    /// Reserved for term kinds outside the RDF 1.1 model.
    pub const UNKNOWN_TERM: i128 = 22;
}

/// Whether a datatype IRI belongs to the integer family (encodes with
/// discriminant [`disc::INTEGER`], value in slot 1).
pub(crate) fn is_integer_datatype(iri: &str) -> bool {
    matches!(
        iri.strip_prefix(XSD_NS),
        Some(
            "integer"
                | "long"
                | "int"
                | "short"
                | "byte"
                | "nonNegativeInteger"
                | "positiveInteger"
                | "negativeInteger"
                | "nonPositiveInteger"
                | "unsignedLong"
                | "unsignedInt"
                | "unsignedShort"
                | "unsignedByte"
        )
    )
}

/// Subtype codes stored alongside an integer-family value so that, e.g.,
/// `"5"^^xsd:int` and `"5"^^xsd:integer` encode distinctly.
mod int_subtype {
    pub const INTEGER: i128 = 0;
    pub const LONG: i128 = 1;
    pub const INT: i128 = 2;
    pub const SHORT: i128 = 3;
    pub const BYTE: i128 = 4;
    pub const NON_NEGATIVE: i128 = 5;
    pub const POSITIVE: i128 = 6;
    pub const UNSIGNED_LONG: i128 = 7;
    pub const UNSIGNED_INT: i128 = 8;
    pub const UNSIGNED_SHORT: i128 = 9;
    pub const UNSIGNED_BYTE: i128 = 10;
    pub const NEGATIVE: i128 = 11;
    pub const NON_POSITIVE: i128 = 12;
}

/// A term encoded as exactly `width` integer slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedTerm {
    slots: Vec<i128>,
}

impl EncodedTerm {
    /// The term-kind / datatype-family discriminant (slot 0).
    pub fn discriminant(&self) -> i128 {
        self.slots[0]
    }

    pub fn width(&self) -> usize {
        self.slots.len()
    }

    pub fn as_slots(&self) -> &[i128] {
        &self.slots
    }

    pub fn into_slots(self) -> Vec<i128> {
        self.slots
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encode an RDF term into `width` slots.
pub fn encode_term(term: &Term, width: usize) -> Result<EncodedTerm, EncodeError> {
    match term {
        Term::NamedNode(nn) => pack(disc::IRI, utf8_slots(nn.as_str()), nn.as_str(), "IRI", width),
        Term::BlankNode(bn) => pack(
            disc::BLANK,
            utf8_slots(bn.as_str()),
            bn.as_str(),
            "blank node",
            width,
        ),
        Term::Literal(lit) => encode_literal(lit, width),
    }
}

fn encode_literal(lit: &Literal, width: usize) -> Result<EncodedTerm, EncodeError> {
    if let Some(lang) = lit.language() {
        // Fixed 8-slot language tag (padded or truncated), then the value.
        let mut payload = vec![0i128; LANG_TAG_SLOTS];
        for (i, b) in lang.bytes().take(LANG_TAG_SLOTS).enumerate() {
            payload[i] = b as i128;
        }
        payload.extend(utf8_slots(lit.value()));
        return pack(
            disc::LANG_LITERAL,
            payload,
            lit.value(),
            "rdf:langString",
            width,
        );
    }

    let datatype = lit.datatype();
    let value = lit.value();
    let Some(local) = datatype.as_str().strip_prefix(XSD_NS) else {
        return encode_other_literal(value, datatype.as_str(), width);
    };

    match local {
        "string" => pack(disc::STRING, utf8_slots(value), value, "xsd:string", width),
        "boolean" => encode_boolean(value, width),
        "integer" | "long" | "int" | "short" | "byte" | "nonNegativeInteger"
        | "positiveInteger" | "negativeInteger" | "nonPositiveInteger" | "unsignedLong"
        | "unsignedInt" | "unsignedShort" | "unsignedByte" => {
            encode_integer(value, local, datatype.as_str(), width)
        }
        "decimal" => encode_decimal(value, width),
        "float" => encode_float(value, width),
        "double" => encode_double(value, width),
        "dateTime" => encode_date_time(value, width),
        "date" => encode_date(value, width),
        "time" => encode_time(value, width),
        "gYear" => encode_g_year(value, width),
        "gMonth" => encode_g_month(value, width),
        "gDay" => encode_g_day(value, width),
        "gYearMonth" => encode_g_year_month(value, width),
        "gMonthDay" => encode_g_month_day(value, width),
        "duration" => encode_duration(value, disc::DURATION, width),
        "dayTimeDuration" => encode_duration(value, disc::DAY_TIME_DURATION, width),
        "yearMonthDuration" => encode_duration(value, disc::YEAR_MONTH_DURATION, width),
        // Recognized binary types and unknown datatypes share the generic
        // typed-literal layout; the datatype IRI is part of the payload.
        _ => encode_other_literal(value, datatype.as_str(), width),
    }
}

fn encode_boolean(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let bit = match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => 1,
        "false" | "0" => 0,
        _ => return Err(EncodeError::invalid(value, "xsd:boolean")),
    };
    pack(disc::BOOLEAN, vec![bit], value, "xsd:boolean", width)
}

fn encode_integer(
    value: &str,
    local: &str,
    datatype: &str,
    width: usize,
) -> Result<EncodedTerm, EncodeError> {
    use std::num::IntErrorKind;

    let n: i128 = value.trim().parse().map_err(|e: std::num::ParseIntError| {
        match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                EncodeError::out_of_range(value, datatype)
            }
            _ => EncodeError::invalid(value, datatype),
        }
    })?;

    let (code, lo, hi) = match local {
        "integer" => (int_subtype::INTEGER, i128::MIN, i128::MAX),
        "long" => (int_subtype::LONG, i64::MIN as i128, i64::MAX as i128),
        "int" => (int_subtype::INT, i32::MIN as i128, i32::MAX as i128),
        "short" => (int_subtype::SHORT, i16::MIN as i128, i16::MAX as i128),
        "byte" => (int_subtype::BYTE, i8::MIN as i128, i8::MAX as i128),
        "nonNegativeInteger" => (int_subtype::NON_NEGATIVE, 0, i128::MAX),
        "positiveInteger" => (int_subtype::POSITIVE, 1, i128::MAX),
        "negativeInteger" => (int_subtype::NEGATIVE, i128::MIN, -1),
        "nonPositiveInteger" => (int_subtype::NON_POSITIVE, i128::MIN, 0),
        "unsignedLong" => (int_subtype::UNSIGNED_LONG, 0, u64::MAX as i128),
        "unsignedInt" => (int_subtype::UNSIGNED_INT, 0, u32::MAX as i128),
        "unsignedShort" => (int_subtype::UNSIGNED_SHORT, 0, u16::MAX as i128),
        "unsignedByte" => (int_subtype::UNSIGNED_BYTE, 0, u8::MAX as i128),
        _ => unreachable!("caller routes only integer-family locals"),
    };
    if n < lo || n > hi {
        return Err(EncodeError::out_of_range(value, datatype));
    }
    pack(disc::INTEGER, vec![n, code], value, datatype, width)
}

fn encode_decimal(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let trimmed = value.trim();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (1i128, &trimmed[1..]),
        Some(b'+') => (0, &trimmed[1..]),
        _ => (0, trimmed),
    };
    // XSD 1.1 admits an empty integer part (".5") and an empty fraction
    // ("5."), but not both at once; the dot slot keeps "5." distinct from "5".
    let (dotted, int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (1i128, i, f),
        None => (0, rest, ""),
    };
    if (int_part.is_empty() && frac_part.is_empty())
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(EncodeError::invalid(value, "xsd:decimal"));
    }

    let mut payload = vec![sign, dotted, int_part.len() as i128];
    payload.extend(int_part.bytes().map(|b| (b - b'0') as i128));
    payload.push(frac_part.len() as i128);
    payload.extend(frac_part.bytes().map(|b| (b - b'0') as i128));
    pack(disc::DECIMAL, payload, value, "xsd:decimal", width)
}

fn encode_float(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let parsed: oxsdatatypes::Float = value
        .trim()
        .parse()
        .map_err(|_| EncodeError::invalid(value, "xsd:float"))?;
    let payload = f32::from(parsed)
        .to_le_bytes()
        .iter()
        .map(|&b| b as i128)
        .collect();
    pack(disc::FLOAT, payload, value, "xsd:float", width)
}

fn encode_double(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let parsed: oxsdatatypes::Double = value
        .trim()
        .parse()
        .map_err(|_| EncodeError::invalid(value, "xsd:double"))?;
    let payload = f64::from(parsed)
        .to_le_bytes()
        .iter()
        .map(|&b| b as i128)
        .collect();
    pack(disc::DOUBLE, payload, value, "xsd:double", width)
}

// -----------------------------------------------------------------------------
// Date/time family
//
// oxsdatatypes validates the XSD 1.1 lexical grammar; the component extraction
// below then works on an already-validated string. Variable-width fields
// (year, microseconds, timezone) are length-prefixed with little-endian
// magnitude bytes, signs as a leading 0/1 slot. An absent timezone encodes a
// zero-length field, so it never collides with `Z`/`+00:00`.
// -----------------------------------------------------------------------------

fn encode_date_time(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let datatype = "xsd:dateTime";
    value
        .trim()
        .parse::<oxsdatatypes::DateTime>()
        .map_err(|_| EncodeError::invalid(value, datatype))?;
    let trimmed = value.trim();
    let (date, time_tz) = trimmed
        .split_once('T')
        .ok_or_else(|| EncodeError::invalid(value, datatype))?;
    let (time, tz) = split_timezone(time_tz);
    let (year, month, day) = split_date(date).ok_or_else(|| EncodeError::invalid(value, datatype))?;
    let (hour, minute, second, micros) =
        split_time(time).ok_or_else(|| EncodeError::invalid(value, datatype))?;

    let mut payload = length_prefixed(signed_field(year));
    payload.extend([month, day, hour, minute, second]);
    payload.extend(length_prefixed(unsigned_field(micros)));
    payload.extend(timezone_field(tz));
    pack(disc::DATE_TIME, payload, value, datatype, width)
}

fn encode_date(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let datatype = "xsd:date";
    value
        .trim()
        .parse::<oxsdatatypes::Date>()
        .map_err(|_| EncodeError::invalid(value, datatype))?;
    let (body, tz) = split_timezone(value.trim());
    let (year, month, day) = split_date(body).ok_or_else(|| EncodeError::invalid(value, datatype))?;

    let mut payload = length_prefixed(signed_field(year));
    payload.extend([month, day]);
    payload.extend(timezone_field(tz));
    pack(disc::DATE, payload, value, datatype, width)
}

fn encode_time(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let datatype = "xsd:time";
    value
        .trim()
        .parse::<oxsdatatypes::Time>()
        .map_err(|_| EncodeError::invalid(value, datatype))?;
    let (body, tz) = split_timezone(value.trim());
    let (hour, minute, second, micros) =
        split_time(body).ok_or_else(|| EncodeError::invalid(value, datatype))?;

    let mut payload = vec![hour, minute, second];
    payload.extend(length_prefixed(unsigned_field(micros)));
    payload.extend(timezone_field(tz));
    pack(disc::TIME, payload, value, datatype, width)
}

fn encode_g_year(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let datatype = "xsd:gYear";
    value
        .trim()
        .parse::<oxsdatatypes::GYear>()
        .map_err(|_| EncodeError::invalid(value, datatype))?;
    let (body, tz) = split_timezone(value.trim());
    let year: i64 = body
        .parse()
        .map_err(|_| EncodeError::invalid(value, datatype))?;

    let mut payload = length_prefixed(signed_field(year));
    payload.extend(timezone_field(tz));
    pack(disc::G_YEAR, payload, value, datatype, width)
}

fn encode_g_month(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let datatype = "xsd:gMonth";
    value
        .trim()
        .parse::<oxsdatatypes::GMonth>()
        .map_err(|_| EncodeError::invalid(value, datatype))?;
    let (body, tz) = split_timezone(value.trim());
    let month = body
        .strip_prefix("--")
        .and_then(parse_two_digits)
        .ok_or_else(|| EncodeError::invalid(value, datatype))?;

    let mut payload = vec![month];
    payload.extend(timezone_field(tz));
    pack(disc::G_MONTH, payload, value, datatype, width)
}

fn encode_g_day(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let datatype = "xsd:gDay";
    value
        .trim()
        .parse::<oxsdatatypes::GDay>()
        .map_err(|_| EncodeError::invalid(value, datatype))?;
    let (body, tz) = split_timezone(value.trim());
    let day = body
        .strip_prefix("---")
        .and_then(parse_two_digits)
        .ok_or_else(|| EncodeError::invalid(value, datatype))?;

    let mut payload = vec![day];
    payload.extend(timezone_field(tz));
    pack(disc::G_DAY, payload, value, datatype, width)
}

fn encode_g_year_month(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let datatype = "xsd:gYearMonth";
    value
        .trim()
        .parse::<oxsdatatypes::GYearMonth>()
        .map_err(|_| EncodeError::invalid(value, datatype))?;
    let (body, tz) = split_timezone(value.trim());
    let (year_s, month_s) = body
        .rsplit_once('-')
        .ok_or_else(|| EncodeError::invalid(value, datatype))?;
    let year: i64 = year_s
        .parse()
        .map_err(|_| EncodeError::invalid(value, datatype))?;
    let month =
        parse_two_digits(month_s).ok_or_else(|| EncodeError::invalid(value, datatype))?;

    let mut payload = length_prefixed(signed_field(year));
    payload.push(month);
    payload.extend(timezone_field(tz));
    pack(disc::G_YEAR_MONTH, payload, value, datatype, width)
}

fn encode_g_month_day(value: &str, width: usize) -> Result<EncodedTerm, EncodeError> {
    let datatype = "xsd:gMonthDay";
    value
        .trim()
        .parse::<oxsdatatypes::GMonthDay>()
        .map_err(|_| EncodeError::invalid(value, datatype))?;
    let (body, tz) = split_timezone(value.trim());
    let rest = body
        .strip_prefix("--")
        .ok_or_else(|| EncodeError::invalid(value, datatype))?;
    let (month_s, day_s) = rest
        .split_once('-')
        .ok_or_else(|| EncodeError::invalid(value, datatype))?;
    let month = parse_two_digits(month_s).ok_or_else(|| EncodeError::invalid(value, datatype))?;
    let day = parse_two_digits(day_s).ok_or_else(|| EncodeError::invalid(value, datatype))?;

    let mut payload = vec![month, day];
    payload.extend(timezone_field(tz));
    pack(disc::G_MONTH_DAY, payload, value, datatype, width)
}

fn encode_duration(value: &str, d: i128, width: usize) -> Result<EncodedTerm, EncodeError> {
    let datatype = match d {
        disc::DAY_TIME_DURATION => "xsd:dayTimeDuration",
        disc::YEAR_MONTH_DURATION => "xsd:yearMonthDuration",
        _ => "xsd:duration",
    };
    let trimmed = value.trim();
    // Subtype-specific grammar validation.
    let ok = match d {
        disc::DAY_TIME_DURATION => trimmed.parse::<oxsdatatypes::DayTimeDuration>().is_ok(),
        disc::YEAR_MONTH_DURATION => trimmed.parse::<oxsdatatypes::YearMonthDuration>().is_ok(),
        _ => trimmed.parse::<oxsdatatypes::Duration>().is_ok(),
    };
    if !ok {
        return Err(EncodeError::invalid(value, datatype));
    }
    let parts =
        split_duration(trimmed).ok_or_else(|| EncodeError::invalid(value, datatype))?;

    let mut payload = vec![
        parts.negative as i128,
        parts.years,
        parts.months,
        parts.days,
        parts.hours,
        parts.minutes,
        parts.seconds,
    ];
    payload.extend(length_prefixed(unsigned_field(parts.micros)));
    pack(d, payload, value, datatype, width)
}

fn encode_other_literal(
    value: &str,
    datatype: &str,
    width: usize,
) -> Result<EncodedTerm, EncodeError> {
    // Canonical generic layout: length-prefixed datatype IRI, then a
    // length-prefixed payload. hexBinary/base64Binary payloads are the decoded
    // bytes, anything else the UTF-8 lexical form.
    let payload_bytes: Vec<u8> = match datatype.strip_prefix(XSD_NS) {
        Some("hexBinary") => {
            let compact: String = value.split_whitespace().collect();
            hex::decode(&compact).map_err(|_| EncodeError::invalid(value, "xsd:hexBinary"))?
        }
        Some("base64Binary") => {
            use base64::Engine as _;
            let compact: String = value.split_whitespace().collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map_err(|_| EncodeError::invalid(value, "xsd:base64Binary"))?
        }
        _ => value.as_bytes().to_vec(),
    };

    let dt_bytes = datatype.as_bytes();
    let mut payload = Vec::with_capacity(2 + dt_bytes.len() + payload_bytes.len());
    payload.push(dt_bytes.len() as i128);
    payload.extend(dt_bytes.iter().map(|&b| b as i128));
    payload.push(payload_bytes.len() as i128);
    payload.extend(payload_bytes.iter().map(|&b| b as i128));
    pack(disc::OTHER_LITERAL, payload, value, datatype, width)
}

// =============================================================================
// DECODING
// =============================================================================

/// Decode a slot vector back into the RDF term it encodes.
///
/// Exact inverse of [`encode_term`] up to value equality (canonical lexical
/// forms are produced, e.g. uppercase hex and `Z` for a zero timezone).
pub fn decode_term(slots: &[i128]) -> Result<Term, EncodeError> {
    let Some((&d, payload)) = slots.split_first() else {
        return Err(EncodeError::MalformedPayload("empty slot vector".into()));
    };

    match d {
        disc::IRI => Ok(NamedNode::new_unchecked(padded_string(payload)?).into()),
        disc::BLANK => Ok(BlankNode::new_unchecked(padded_string(payload)?).into()),
        disc::LANG_LITERAL => {
            if payload.len() < LANG_TAG_SLOTS {
                return Err(EncodeError::MalformedPayload(
                    "language-tagged literal shorter than the tag field".into(),
                ));
            }
            let lang = padded_string(&payload[..LANG_TAG_SLOTS])?;
            let value = padded_string(&payload[LANG_TAG_SLOTS..])?;
            Ok(Literal::new_language_tagged_literal_unchecked(value, lang).into())
        }
        disc::STRING | disc::PLAIN_LITERAL => {
            Ok(Literal::new_simple_literal(padded_string(payload)?).into())
        }
        disc::BOOLEAN => {
            let lexical = match payload.first().copied() {
                Some(0) => "false",
                Some(1) => "true",
                _ => {
                    return Err(EncodeError::MalformedPayload(
                        "boolean slot is not 0 or 1".into(),
                    ));
                }
            };
            Ok(typed(lexical, "boolean"))
        }
        disc::INTEGER => {
            let mut r = SlotReader::new(payload);
            let value = r.take()?;
            let local = match r.take()? {
                int_subtype::INTEGER => "integer",
                int_subtype::LONG => "long",
                int_subtype::INT => "int",
                int_subtype::SHORT => "short",
                int_subtype::BYTE => "byte",
                int_subtype::NON_NEGATIVE => "nonNegativeInteger",
                int_subtype::POSITIVE => "positiveInteger",
                int_subtype::UNSIGNED_LONG => "unsignedLong",
                int_subtype::UNSIGNED_INT => "unsignedInt",
                int_subtype::UNSIGNED_SHORT => "unsignedShort",
                int_subtype::UNSIGNED_BYTE => "unsignedByte",
                int_subtype::NEGATIVE => "negativeInteger",
                int_subtype::NON_POSITIVE => "nonPositiveInteger",
                other => {
                    return Err(EncodeError::MalformedPayload(format!(
                        "unknown integer subtype code {other}"
                    )));
                }
            };
            Ok(typed(&value.to_string(), local))
        }
        disc::DECIMAL => {
            let mut r = SlotReader::new(payload);
            let negative = r.sign_slot()?;
            let dotted = r.flag()?;
            let int_digits = r.digits()?;
            let frac_digits = r.digits()?;
            if !dotted && !frac_digits.is_empty() {
                return Err(EncodeError::MalformedPayload(
                    "fraction digits without a decimal point".into(),
                ));
            }
            if int_digits.is_empty() && frac_digits.is_empty() {
                return Err(EncodeError::MalformedPayload(
                    "decimal with no digits".into(),
                ));
            }
            let mut lexical = String::new();
            if negative {
                lexical.push('-');
            }
            lexical.push_str(&int_digits);
            if dotted {
                lexical.push('.');
                lexical.push_str(&frac_digits);
            }
            Ok(typed(&lexical, "decimal"))
        }
        disc::FLOAT => {
            let mut r = SlotReader::new(payload);
            let mut bytes = [0u8; 4];
            for slot in &mut bytes {
                *slot = r.byte()?;
            }
            Ok(typed(&float_lexical(f32::from_le_bytes(bytes)), "float"))
        }
        disc::DOUBLE => {
            let mut r = SlotReader::new(payload);
            let mut bytes = [0u8; 8];
            for slot in &mut bytes {
                *slot = r.byte()?;
            }
            Ok(typed(&double_lexical(f64::from_le_bytes(bytes)), "double"))
        }
        disc::DATE_TIME => {
            let mut r = SlotReader::new(payload);
            let year = r.signed_var()?;
            let [month, day, hour, minute, second] = [r.take()?, r.take()?, r.take()?, r.take()?, r.take()?];
            let micros = r.unsigned_var()?;
            let tz = r.timezone()?;
            let lexical = format!(
                "{}T{:02}:{:02}:{:02}{}{}",
                format_date(year, month, day),
                hour,
                minute,
                second,
                fraction_lexical(micros),
                timezone_lexical(tz)
            );
            Ok(typed(&lexical, "dateTime"))
        }
        disc::DATE => {
            let mut r = SlotReader::new(payload);
            let year = r.signed_var()?;
            let [month, day] = [r.take()?, r.take()?];
            let tz = r.timezone()?;
            Ok(typed(
                &format!("{}{}", format_date(year, month, day), timezone_lexical(tz)),
                "date",
            ))
        }
        disc::TIME => {
            let mut r = SlotReader::new(payload);
            let [hour, minute, second] = [r.take()?, r.take()?, r.take()?];
            let micros = r.unsigned_var()?;
            let tz = r.timezone()?;
            let lexical = format!(
                "{:02}:{:02}:{:02}{}{}",
                hour,
                minute,
                second,
                fraction_lexical(micros),
                timezone_lexical(tz)
            );
            Ok(typed(&lexical, "time"))
        }
        disc::G_YEAR => {
            let mut r = SlotReader::new(payload);
            let year = r.signed_var()?;
            let tz = r.timezone()?;
            Ok(typed(
                &format!("{}{}", format_year(year), timezone_lexical(tz)),
                "gYear",
            ))
        }
        disc::G_MONTH => {
            let mut r = SlotReader::new(payload);
            let month = r.take()?;
            let tz = r.timezone()?;
            Ok(typed(
                &format!("--{:02}{}", month, timezone_lexical(tz)),
                "gMonth",
            ))
        }
        disc::G_DAY => {
            let mut r = SlotReader::new(payload);
            let day = r.take()?;
            let tz = r.timezone()?;
            Ok(typed(
                &format!("---{:02}{}", day, timezone_lexical(tz)),
                "gDay",
            ))
        }
        disc::G_YEAR_MONTH => {
            let mut r = SlotReader::new(payload);
            let year = r.signed_var()?;
            let month = r.take()?;
            let tz = r.timezone()?;
            Ok(typed(
                &format!("{}-{:02}{}", format_year(year), month, timezone_lexical(tz)),
                "gYearMonth",
            ))
        }
        disc::G_MONTH_DAY => {
            let mut r = SlotReader::new(payload);
            let [month, day] = [r.take()?, r.take()?];
            let tz = r.timezone()?;
            Ok(typed(
                &format!("--{:02}-{:02}{}", month, day, timezone_lexical(tz)),
                "gMonthDay",
            ))
        }
        disc::DURATION | disc::DAY_TIME_DURATION | disc::YEAR_MONTH_DURATION => {
            let mut r = SlotReader::new(payload);
            let negative = r.sign_slot()?;
            let fields = [r.take()?, r.take()?, r.take()?, r.take()?, r.take()?, r.take()?];
            let micros = r.unsigned_var()?;
            let lexical = duration_lexical(negative, fields, micros);
            let local = match d {
                disc::DAY_TIME_DURATION => "dayTimeDuration",
                disc::YEAR_MONTH_DURATION => "yearMonthDuration",
                _ => "duration",
            };
            Ok(typed(&lexical, local))
        }
        disc::OTHER_LITERAL => {
            let mut r = SlotReader::new(payload);
            let dt_len = r.take()? as usize;
            let datatype = String::from_utf8(r.bytes(dt_len)?)
                .map_err(|_| EncodeError::MalformedPayload("datatype IRI is not UTF-8".into()))?;
            let val_len = r.take()? as usize;
            let raw = r.bytes(val_len)?;
            let lexical = match datatype.strip_prefix(XSD_NS) {
                Some("hexBinary") => hex::encode_upper(&raw),
                Some("base64Binary") => {
                    use base64::Engine as _;
                    base64::engine::general_purpose::STANDARD.encode(&raw)
                }
                _ => String::from_utf8(raw).map_err(|_| {
                    EncodeError::MalformedPayload("literal value is not UTF-8".into())
                })?,
            };
            Ok(Literal::new_typed_literal(lexical, NamedNode::new_unchecked(datatype)).into())
        }
        other => Err(EncodeError::InvalidDiscriminant(other)),
    }
}

// =============================================================================
// FIELD HELPERS
// =============================================================================

fn pack(
    d: i128,
    payload: Vec<i128>,
    value: &str,
    datatype: &str,
    width: usize,
) -> Result<EncodedTerm, EncodeError> {
    if payload.len() + 1 > width {
        return Err(EncodeError::LengthExceeded {
            value: value.to_string(),
            datatype: datatype.to_string(),
            needed: payload.len() + 1,
            budget: width,
        });
    }
    let mut slots = Vec::with_capacity(width);
    slots.push(d);
    slots.extend(payload);
    slots.resize(width, 0);
    Ok(EncodedTerm { slots })
}

fn utf8_slots(s: &str) -> Vec<i128> {
    s.bytes().map(|b| b as i128).collect()
}

fn typed(lexical: &str, local: &str) -> Term {
    Literal::new_typed_literal(lexical, NamedNode::new_unchecked(format!("{XSD_NS}{local}"))).into()
}

/// Sign slot (0/1) followed by >= 1 little-endian magnitude bytes.
fn signed_field(v: i64) -> Vec<i128> {
    let mut out = vec![if v < 0 { 1 } else { 0 }];
    out.extend(unsigned_field(v.unsigned_abs()));
    out
}

fn unsigned_field(v: u64) -> Vec<i128> {
    let mut out = Vec::new();
    let mut rest = v;
    loop {
        out.push((rest & 0xff) as i128);
        rest >>= 8;
        if rest == 0 {
            break;
        }
    }
    out
}

fn length_prefixed(field: Vec<i128>) -> Vec<i128> {
    let mut out = vec![field.len() as i128];
    out.extend(field);
    out
}

/// Timezone field: `[0]` when absent, otherwise a length-prefixed signed
/// offset in minutes.
fn timezone_field(tz: Option<i32>) -> Vec<i128> {
    match tz {
        None => vec![0],
        Some(minutes) => length_prefixed(signed_field(minutes as i64)),
    }
}

/// Split a trailing `Z` or `+hh:mm`/`-hh:mm` timezone from a lexical form.
fn split_timezone(s: &str) -> (&str, Option<i32>) {
    if let Some(body) = s.strip_suffix('Z') {
        return (body, Some(0));
    }
    if s.len() >= 6 {
        let (body, suffix) = s.split_at(s.len() - 6);
        let bytes = suffix.as_bytes();
        if (bytes[0] == b'+' || bytes[0] == b'-') && bytes[3] == b':' {
            if let (Some(h), Some(m)) = (
                parse_two_digits(&suffix[1..3]),
                parse_two_digits(&suffix[4..6]),
            ) {
                let minutes = (h * 60 + m) as i32;
                let signed = if bytes[0] == b'-' { -minutes } else { minutes };
                return (body, Some(signed));
            }
        }
    }
    (s, None)
}

/// `YYYY-MM-DD` with an optional leading sign and >= 4 year digits.
fn split_date(s: &str) -> Option<(i64, i128, i128)> {
    if s.len() < 10 {
        return None;
    }
    let (rest, day_s) = s.split_at(s.len() - 3);
    let day = parse_two_digits(day_s.strip_prefix('-')?)?;
    let (year_s, month_s) = rest.split_at(rest.len() - 3);
    let month = parse_two_digits(month_s.strip_prefix('-')?)?;
    let year: i64 = year_s.parse().ok()?;
    Some((year, month, day))
}

/// `hh:mm:ss` with optional fractional seconds, returned as microseconds.
fn split_time(s: &str) -> Option<(i128, i128, i128, u64)> {
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    let mut it = whole.split(':');
    let hour = parse_two_digits(it.next()?)?;
    let minute = parse_two_digits(it.next()?)?;
    let second = parse_two_digits(it.next()?)?;
    if it.next().is_some() {
        return None;
    }
    let micros = parse_micros(frac)?;
    Some((hour, minute, second, micros))
}

/// Fractional-second digits as microseconds. Sub-microsecond precision does
/// not fit the field and is rejected, never truncated; trailing zeros carry
/// no precision and are dropped.
fn parse_micros(frac: &str) -> Option<u64> {
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let significant = frac.trim_end_matches('0');
    if significant.len() > 6 {
        return None;
    }
    let mut padded = significant.to_string();
    while padded.len() < 6 {
        padded.push('0');
    }
    padded.parse().ok()
}

fn parse_two_digits(s: &str) -> Option<i128> {
    if s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

struct DurationParts {
    negative: bool,
    years: i128,
    months: i128,
    days: i128,
    hours: i128,
    minutes: i128,
    seconds: i128,
    micros: u64,
}

fn split_duration(s: &str) -> Option<DurationParts> {
    let (negative, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s),
    };
    let rest = rest.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut parts = DurationParts {
        negative,
        years: 0,
        months: 0,
        days: 0,
        hours: 0,
        minutes: 0,
        seconds: 0,
        micros: 0,
    };

    let mut num = String::new();
    for c in date_part.chars() {
        if c.is_ascii_digit() {
            num.push(c);
        } else {
            let n: i128 = num.parse().ok()?;
            num.clear();
            match c {
                'Y' => parts.years = n,
                'M' => parts.months = n,
                'D' => parts.days = n,
                _ => return None,
            }
        }
    }
    for c in time_part.chars() {
        if c.is_ascii_digit() || c == '.' {
            num.push(c);
        } else {
            match c {
                'H' => parts.hours = num.parse().ok()?,
                'M' => parts.minutes = num.parse().ok()?,
                'S' => {
                    let (whole, frac) = match num.split_once('.') {
                        Some((w, f)) => (w, f),
                        None => (num.as_str(), ""),
                    };
                    parts.seconds = whole.parse().ok()?;
                    parts.micros = parse_micros(frac)?;
                }
                _ => return None,
            }
            num.clear();
        }
    }
    Some(parts)
}

// -----------------------------------------------------------------------------
// Decode-side readers and lexical reconstruction
// -----------------------------------------------------------------------------

struct SlotReader<'a> {
    slots: &'a [i128],
    pos: usize,
}

impl<'a> SlotReader<'a> {
    fn new(slots: &'a [i128]) -> Self {
        Self { slots, pos: 0 }
    }

    fn take(&mut self) -> Result<i128, EncodeError> {
        let v = self
            .slots
            .get(self.pos)
            .copied()
            .ok_or_else(|| EncodeError::MalformedPayload("truncated payload".into()))?;
        self.pos += 1;
        Ok(v)
    }

    fn sign_slot(&mut self) -> Result<bool, EncodeError> {
        match self.take()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(EncodeError::MalformedPayload(format!(
                "sign slot is {other}, expected 0 or 1"
            ))),
        }
    }

    fn flag(&mut self) -> Result<bool, EncodeError> {
        match self.take()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(EncodeError::MalformedPayload(format!(
                "flag slot is {other}, expected 0 or 1"
            ))),
        }
    }

    fn byte(&mut self) -> Result<u8, EncodeError> {
        let v = self.take()?;
        u8::try_from(v).map_err(|_| EncodeError::MalformedPayload(format!("slot {v} is not a byte")))
    }

    fn bytes(&mut self, n: usize) -> Result<Vec<u8>, EncodeError> {
        (0..n).map(|_| self.byte()).collect()
    }

    /// Little-endian magnitude of at most 8 bytes.
    fn magnitude(&mut self, len: usize) -> Result<u64, EncodeError> {
        if len > 8 {
            return Err(EncodeError::MalformedPayload(format!(
                "magnitude field of {len} bytes exceeds 64 bits"
            )));
        }
        Ok(le_value(&self.bytes(len)?))
    }

    /// Length-prefixed signed field: `[len, sign, le_bytes...]`.
    fn signed_var(&mut self) -> Result<i64, EncodeError> {
        let len = self.take()? as usize;
        if len < 2 {
            return Err(EncodeError::MalformedPayload(
                "signed field shorter than sign + magnitude".into(),
            ));
        }
        let negative = self.sign_slot()?;
        let magnitude = self.magnitude(len - 1)? as i128;
        let signed = if negative { -magnitude } else { magnitude };
        i64::try_from(signed).map_err(|_| {
            EncodeError::MalformedPayload(format!("signed field value {signed} exceeds 64 bits"))
        })
    }

    /// Length-prefixed unsigned field: `[len, le_bytes...]`.
    fn unsigned_var(&mut self) -> Result<u64, EncodeError> {
        let len = self.take()? as usize;
        self.magnitude(len)
    }

    /// Timezone field as written by `timezone_field`.
    fn timezone(&mut self) -> Result<Option<i32>, EncodeError> {
        let len = self.take()? as usize;
        if len == 0 {
            return Ok(None);
        }
        if len < 2 {
            return Err(EncodeError::MalformedPayload("truncated timezone".into()));
        }
        let negative = self.sign_slot()?;
        let magnitude = self.magnitude(len - 1)?;
        let minutes = i32::try_from(magnitude).map_err(|_| {
            EncodeError::MalformedPayload(format!("timezone offset {magnitude} out of range"))
        })?;
        Ok(Some(if negative { -minutes } else { minutes }))
    }

    /// Length-prefixed run of decimal digits.
    fn digits(&mut self) -> Result<String, EncodeError> {
        let len = self.take()? as usize;
        let mut out = String::with_capacity(len);
        for _ in 0..len {
            let v = self.take()?;
            if !(0..=9).contains(&v) {
                return Err(EncodeError::MalformedPayload(format!(
                    "digit slot {v} out of range"
                )));
            }
            out.push((b'0' + v as u8) as char);
        }
        Ok(out)
    }
}

fn le_value(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// UTF-8 string from a zero-padded slot run.
fn padded_string(slots: &[i128]) -> Result<String, EncodeError> {
    let end = slots
        .iter()
        .rposition(|&v| v != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    let bytes: Vec<u8> = slots[..end]
        .iter()
        .map(|&v| {
            u8::try_from(v)
                .map_err(|_| EncodeError::MalformedPayload(format!("slot {v} is not a byte")))
        })
        .collect::<Result<_, _>>()?;
    String::from_utf8(bytes)
        .map_err(|_| EncodeError::MalformedPayload("payload is not UTF-8".into()))
}

// Formatting the f32 itself yields the shortest lexical that round-trips the
// 32-bit value; widening to f64 first would print spurious digits.
fn float_lexical(f: f32) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "INF".to_string() } else { "-INF".to_string() }
    } else {
        format!("{f}")
    }
}

fn double_lexical(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "INF".to_string() } else { "-INF".to_string() }
    } else {
        format!("{f}")
    }
}

fn format_year(year: i64) -> String {
    if year < 0 {
        format!("-{:04}", year.unsigned_abs())
    } else {
        format!("{year:04}")
    }
}

fn format_date(year: i64, month: i128, day: i128) -> String {
    format!("{}-{:02}-{:02}", format_year(year), month, day)
}

fn fraction_lexical(micros: u64) -> String {
    if micros == 0 {
        return String::new();
    }
    let mut frac = format!("{micros:06}");
    while frac.ends_with('0') {
        frac.pop();
    }
    format!(".{frac}")
}

fn timezone_lexical(tz: Option<i32>) -> String {
    match tz {
        None => String::new(),
        Some(0) => "Z".to_string(),
        Some(minutes) => {
            let sign = if minutes < 0 { '-' } else { '+' };
            let m = minutes.unsigned_abs();
            format!("{}{:02}:{:02}", sign, m / 60, m % 60)
        }
    }
}

fn duration_lexical(negative: bool, fields: [i128; 6], micros: u64) -> String {
    let [years, months, days, hours, minutes, seconds] = fields;
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    if years != 0 {
        out.push_str(&format!("{years}Y"));
    }
    if months != 0 {
        out.push_str(&format!("{months}M"));
    }
    if days != 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours != 0 || minutes != 0 || seconds != 0 || micros != 0 {
        out.push('T');
        if hours != 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes != 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if seconds != 0 || micros != 0 {
            out.push_str(&format!("{seconds}{}S", fraction_lexical(micros)));
        }
    }
    // All-zero duration still needs one component.
    if out.ends_with('P') {
        out.push_str("T0S");
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const W: usize = DEFAULT_TERM_WIDTH;

    fn iri(s: &str) -> Term {
        NamedNode::new_unchecked(s).into()
    }

    fn lit(value: &str, local: &str) -> Term {
        typed(value, local)
    }

    fn round_trip(term: Term) {
        let encoded = encode_term(&term, W).expect("encodes");
        assert_eq!(encoded.width(), W);
        let decoded = decode_term(encoded.as_slots()).expect("decodes");
        assert_eq!(decoded, term);
    }

    #[test]
    fn iri_round_trip() {
        round_trip(iri("http://example.org/people#alice"));
    }

    #[test]
    fn blank_node_round_trip() {
        round_trip(BlankNode::new_unchecked("b12").into());
    }

    #[test]
    fn string_round_trip() {
        round_trip(Literal::new_simple_literal("hello world").into());
        // Typed xsd:string and the simple form are the same RDF 1.1 term.
        round_trip(lit("hello world", "string"));
    }

    #[test]
    fn language_tagged_round_trip() {
        round_trip(Literal::new_language_tagged_literal_unchecked("bonjour", "fr").into());
        round_trip(Literal::new_language_tagged_literal_unchecked("hello", "en-GB").into());
    }

    #[test]
    fn boolean_encoding() {
        for v in ["true", "TRUE", "1"] {
            let e = encode_term(&lit(v, "boolean"), W).unwrap();
            assert_eq!(e.as_slots()[..2], [disc::BOOLEAN, 1]);
        }
        for v in ["false", "False", "0"] {
            let e = encode_term(&lit(v, "boolean"), W).unwrap();
            assert_eq!(e.as_slots()[..2], [disc::BOOLEAN, 0]);
        }
        assert!(matches!(
            encode_term(&lit("yes", "boolean"), W),
            Err(EncodeError::InvalidLexicalForm { .. })
        ));
    }

    #[test]
    fn integer_round_trip() {
        round_trip(lit("0", "integer"));
        round_trip(lit("-42", "integer"));
        round_trip(lit("18446744073709551615", "unsignedLong"));
    }

    #[test]
    fn integer_value_slot() {
        let e = encode_term(&lit("19", "integer"), W).unwrap();
        assert_eq!(e.as_slots()[..3], [disc::INTEGER, 19, 0]);
    }

    #[test]
    fn integer_subtypes_do_not_collide() {
        let a = encode_term(&lit("5", "integer"), W).unwrap();
        let b = encode_term(&lit("5", "int"), W).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn derived_integer_ranges() {
        assert!(encode_term(&lit("127", "byte"), W).is_ok());
        assert!(matches!(
            encode_term(&lit("128", "byte"), W),
            Err(EncodeError::IntegerRange { .. })
        ));
        assert!(matches!(
            encode_term(&lit("-1", "unsignedShort"), W),
            Err(EncodeError::IntegerRange { .. })
        ));
        assert!(matches!(
            encode_term(&lit("0", "positiveInteger"), W),
            Err(EncodeError::IntegerRange { .. })
        ));
        assert!(matches!(
            encode_term(&lit("1", "nonPositiveInteger"), W),
            Err(EncodeError::IntegerRange { .. })
        ));
    }

    #[test]
    fn decimal_round_trip() {
        round_trip(lit("3.14", "decimal"));
        round_trip(lit("-0.5", "decimal"));
        round_trip(lit("100", "decimal"));
        // XSD 1.1 allows a bare fraction and a trailing dot.
        round_trip(lit(".5", "decimal"));
        round_trip(lit("5.", "decimal"));
        for bad in [".", "", "1.2.3", "one"] {
            assert!(matches!(
                encode_term(&lit(bad, "decimal"), W),
                Err(EncodeError::InvalidLexicalForm { .. })
            ));
        }
    }

    #[test]
    fn decimal_dot_presence_is_preserved() {
        let plain = encode_term(&lit("5", "decimal"), W).unwrap();
        let trailing = encode_term(&lit("5.", "decimal"), W).unwrap();
        assert_ne!(plain, trailing);
    }

    #[test]
    fn decimal_layout() {
        let e = encode_term(&lit("-12.5", "decimal"), W).unwrap();
        assert_eq!(e.as_slots()[..8], [disc::DECIMAL, 1, 1, 2, 1, 2, 1, 5]);
    }

    #[test]
    fn float_double_round_trip() {
        round_trip(lit("1.5", "float"));
        // 1.1 is inexact in binary; the decoded lexical must still be the
        // shortest form for the 32-bit value, not the widened double's.
        round_trip(lit("1.1", "float"));
        round_trip(lit("-0.25", "double"));
        round_trip(lit("INF", "double"));
        round_trip(lit("-INF", "float"));
        assert!(matches!(
            encode_term(&lit("not-a-number", "double"), W),
            Err(EncodeError::InvalidLexicalForm { .. })
        ));
    }

    #[test]
    fn nan_encodes_to_ieee_bits() {
        let e = encode_term(&lit("NaN", "double"), W).unwrap();
        let bytes: Vec<u8> = e.as_slots()[1..9].iter().map(|&v| v as u8).collect();
        assert!(f64::from_le_bytes(bytes.try_into().unwrap()).is_nan());
    }

    #[test]
    fn date_time_round_trip() {
        round_trip(lit("2024-03-01T12:30:05Z", "dateTime"));
        round_trip(lit("2024-03-01T12:30:05", "dateTime"));
        round_trip(lit("2024-03-01T12:30:05.25-05:30", "dateTime"));
        round_trip(lit("-0450-01-01T00:00:00", "dateTime"));
    }

    #[test]
    fn sub_microsecond_fractions_are_rejected() {
        // The microsecond field cannot hold a seventh significant digit, and
        // truncating would collide distinct instants.
        assert!(matches!(
            encode_term(&lit("2024-01-01T00:00:00.1234561", "dateTime"), W),
            Err(EncodeError::InvalidLexicalForm { .. })
        ));
        assert!(matches!(
            encode_term(&lit("00:00:00.1234567", "time"), W),
            Err(EncodeError::InvalidLexicalForm { .. })
        ));
        assert!(matches!(
            encode_term(&lit("PT0.1234567S", "duration"), W),
            Err(EncodeError::InvalidLexicalForm { .. })
        ));
        // Trailing zeros carry no precision and stay accepted.
        assert!(encode_term(&lit("2024-01-01T00:00:00.1000000", "dateTime"), W).is_ok());
        assert!(encode_term(&lit("PT0.5000000S", "duration"), W).is_ok());
    }

    #[test]
    fn six_digit_fractions_stay_distinct() {
        let a = encode_term(&lit("2024-01-01T00:00:00.123456", "dateTime"), W).unwrap();
        let b = encode_term(&lit("2024-01-01T00:00:00.123457", "dateTime"), W).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn timezone_presence_is_preserved() {
        let with_z = encode_term(&lit("2024-01-01T00:00:00Z", "dateTime"), W).unwrap();
        let without = encode_term(&lit("2024-01-01T00:00:00", "dateTime"), W).unwrap();
        assert_ne!(with_z, without);
    }

    #[test]
    fn date_and_time_round_trip() {
        round_trip(lit("2024-12-31", "date"));
        round_trip(lit("2024-12-31+14:00", "date"));
        round_trip(lit("23:59:59", "time"));
        round_trip(lit("00:00:00.5Z", "time"));
    }

    #[test]
    fn gregorian_round_trip() {
        round_trip(lit("2024", "gYear"));
        round_trip(lit("-0001Z", "gYear"));
        round_trip(lit("--02", "gMonth"));
        round_trip(lit("---31", "gDay"));
        round_trip(lit("2024-02", "gYearMonth"));
        round_trip(lit("--02-29", "gMonthDay"));
    }

    #[test]
    fn duration_round_trip() {
        round_trip(lit("P1Y2M3DT4H5M6S", "duration"));
        round_trip(lit("-P30D", "duration"));
        round_trip(lit("PT0.5S", "duration"));
        round_trip(lit("P2Y6M", "yearMonthDuration"));
        round_trip(lit("PT36H", "dayTimeDuration"));
    }

    #[test]
    fn duration_subtype_grammar() {
        // A day component is outside yearMonthDuration's grammar.
        assert!(matches!(
            encode_term(&lit("P1D", "yearMonthDuration"), W),
            Err(EncodeError::InvalidLexicalForm { .. })
        ));
        assert!(matches!(
            encode_term(&lit("P1Y", "dayTimeDuration"), W),
            Err(EncodeError::InvalidLexicalForm { .. })
        ));
    }

    #[test]
    fn hex_binary_round_trip() {
        round_trip(lit("0FB8", "hexBinary"));
        // Lowercase input decodes to the uppercase canonical form.
        let e = encode_term(&lit("0fb8", "hexBinary"), W).unwrap();
        let decoded = decode_term(e.as_slots()).unwrap();
        assert_eq!(decoded, lit("0FB8", "hexBinary"));
        assert!(matches!(
            encode_term(&lit("0xZZ", "hexBinary"), W),
            Err(EncodeError::InvalidLexicalForm { .. })
        ));
    }

    #[test]
    fn base64_binary_round_trip() {
        round_trip(lit("aGVsbG8=", "base64Binary"));
        assert!(matches!(
            encode_term(&lit("@@@", "base64Binary"), W),
            Err(EncodeError::InvalidLexicalForm { .. })
        ));
    }

    #[test]
    fn unknown_datatype_routes_to_generic_layout() {
        let term: Term = Literal::new_typed_literal(
            "POINT(1 2)",
            NamedNode::new_unchecked("http://www.opengis.net/ont/geosparql#wktLiteral"),
        )
        .into();
        let e = encode_term(&term, W).unwrap();
        assert_eq!(e.discriminant(), disc::OTHER_LITERAL);
        assert_eq!(decode_term(e.as_slots()).unwrap(), term);
    }

    #[test]
    fn unknown_datatypes_stay_injective() {
        let a: Term = Literal::new_typed_literal(
            "v",
            NamedNode::new_unchecked("http://example.org/dtA"),
        )
        .into();
        let b: Term = Literal::new_typed_literal(
            "v",
            NamedNode::new_unchecked("http://example.org/dtB"),
        )
        .into();
        assert_ne!(encode_term(&a, W).unwrap(), encode_term(&b, W).unwrap());
    }

    #[test]
    fn kind_discriminants_stay_injective() {
        let as_iri = encode_term(&iri("abc"), W).unwrap();
        let as_blank = encode_term(&BlankNode::new_unchecked("abc").into(), W).unwrap();
        let as_string = encode_term(&Literal::new_simple_literal("abc").into(), W).unwrap();
        assert_ne!(as_iri, as_blank);
        assert_ne!(as_iri, as_string);
        assert_ne!(as_blank, as_string);
    }

    #[test]
    fn width_invariant_and_overflow() {
        let short = encode_term(&iri("http://example.org/x"), 32).unwrap();
        assert_eq!(short.width(), 32);

        let long_iri = format!("http://example.org/{}", "a".repeat(200));
        match encode_term(&iri(&long_iri), W) {
            Err(EncodeError::LengthExceeded { needed, budget, .. }) => {
                assert!(needed > budget);
                assert_eq!(budget, W);
            }
            other => panic!("expected LengthExceeded, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(matches!(
            decode_term(&[]),
            Err(EncodeError::MalformedPayload(_))
        ));
        assert!(matches!(
            decode_term(&[99, 0, 0]),
            Err(EncodeError::InvalidDiscriminant(99))
        ));
        assert!(matches!(
            decode_term(&[disc::BOOLEAN, 7]),
            Err(EncodeError::MalformedPayload(_))
        ));
    }

    #[test]
    fn decode_rejects_oversized_year_and_timezone() {
        // An 8-byte year magnitude of u64::MAX does not fit i64.
        let mut year = vec![disc::G_YEAR, 9, 0];
        year.extend([255i128; 8]);
        year.push(0);
        assert!(matches!(
            decode_term(&year),
            Err(EncodeError::MalformedPayload(_))
        ));

        // A 4-byte timezone magnitude of u32::MAX does not fit i32.
        let tz = [disc::G_MONTH, 1, 5, 0, 255, 255, 255, 255];
        assert!(matches!(
            decode_term(&tz),
            Err(EncodeError::MalformedPayload(_))
        ));
    }

    proptest! {
        #[test]
        fn integer_values_round_trip(n in any::<i64>()) {
            round_trip(lit(&n.to_string(), "integer"));
        }

        #[test]
        fn distinct_integers_never_collide(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            let ea = encode_term(&lit(&a.to_string(), "integer"), W).unwrap();
            let eb = encode_term(&lit(&b.to_string(), "integer"), W).unwrap();
            prop_assert_ne!(ea, eb);
        }

        #[test]
        fn iri_payloads_round_trip(s in "[a-z]{1,40}") {
            round_trip(iri(&format!("http://example.org/{s}")));
        }
    }
}
