//! The parameter-data format mini-language (§4.2.3): a tagged-variant stream
//! over a zero-copy cursor, with no dynamic dispatch and no allocation in
//! the byte-level encode/decode loops themselves.

use alloc::string::String;
use alloc::vec::Vec;

use crate::uid::Uid;

/// A single decoded/to-be-encoded parameter-data value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdField {
    U8(u8),
    U16(u16),
    U32(u32),
    Uid(Uid),
    /// Decodes to `None` when the wire value was `Uid::NULL`, mirroring the
    /// encoder's "omit the optional UID field when it is NULL" rule.
    OptUid(Option<Uid>),
    Str(String),
}

/// A format-string syntax error, or a value list that does not match the
/// format it is being encoded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    UnknownSymbol,
    FixedStringHasNoSize,
    FixedStringTooBig,
    VariableStringNotAtEnd,
    OptionalUidNotAtEnd,
    LiteralTooBig,
    UnterminatedLiteral,
    FormatTooBig,
    ValueTypeMismatch,
    ValueCountMismatch,
}

#[derive(Debug, Clone, Copy)]
enum FieldSpec {
    U8,
    U16,
    U32,
    Uid,
    OptUid,
    Str(usize),
    VarStr,
    Literal { bytes: [u8; 8], len: usize },
}

impl FieldSpec {
    /// Worst-case wire size; `VarStr` has none fixed, sized against the
    /// remaining budget at encode/decode time instead.
    fn fixed_size(self) -> Option<usize> {
        match self {
            FieldSpec::U8 => Some(1),
            FieldSpec::U16 => Some(2),
            FieldSpec::U32 => Some(4),
            FieldSpec::Uid | FieldSpec::OptUid => Some(6),
            FieldSpec::Str(n) => Some(n),
            FieldSpec::VarStr => None,
            FieldSpec::Literal { len, .. } => Some(len),
        }
    }
}

fn parse_format(format: &str) -> Result<Vec<FieldSpec>, FormatError> {
    let chars: Vec<char> = format.chars().collect();
    let mut specs = Vec::new();
    let mut format_size: usize = 0;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let spec = match c {
            'b' => {
                i += 1;
                FieldSpec::U8
            }
            'w' => {
                i += 1;
                FieldSpec::U16
            }
            'd' => {
                i += 1;
                FieldSpec::U32
            }
            'u' => {
                i += 1;
                FieldSpec::Uid
            }
            'v' => {
                if i + 1 != chars.len() {
                    return Err(FormatError::OptionalUidNotAtEnd);
                }
                i += 1;
                FieldSpec::OptUid
            }
            'a' => {
                let digit_start = i + 1;
                let mut j = digit_start;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                if j == digit_start {
                    // Bare 'a': variable-length, must be the last field.
                    if digit_start != chars.len() {
                        return Err(FormatError::VariableStringNotAtEnd);
                    }
                    i = j;
                    FieldSpec::VarStr
                } else {
                    let digits: String = chars[digit_start..j].iter().collect();
                    let n: usize = digits.parse().map_err(|_| FormatError::FixedStringTooBig)?;
                    if n == 0 {
                        return Err(FormatError::FixedStringHasNoSize);
                    }
                    if format_size + n > crate::codec::MAX_PDL {
                        return Err(FormatError::FixedStringTooBig);
                    }
                    i = j;
                    FieldSpec::Str(n)
                }
            }
            '#' => {
                let digit_start = i + 1;
                let mut j = digit_start;
                while j < chars.len() && chars[j].is_ascii_hexdigit() {
                    j += 1;
                }
                if j >= chars.len() || chars[j] != 'h' {
                    return Err(FormatError::UnterminatedLiteral);
                }
                let hex: String = chars[digit_start..j].iter().collect();
                let num_bytes = hex.len().div_ceil(2);
                if num_bytes > 8 {
                    return Err(FormatError::LiteralTooBig);
                }
                let value = u64::from_str_radix(&hex, 16).map_err(|_| FormatError::UnterminatedLiteral)?;
                let mut bytes = [0u8; 8];
                bytes[8 - num_bytes..].copy_from_slice(&value.to_be_bytes()[8 - num_bytes..]);
                i = j + 1;
                FieldSpec::Literal { bytes, len: num_bytes }
            }
            _ => return Err(FormatError::UnknownSymbol),
        };

        if let Some(size) = spec.fixed_size() {
            if format_size + size > crate::codec::MAX_PDL {
                return Err(FormatError::FormatTooBig);
            }
            format_size += size;
        }
        specs.push(spec);
    }

    Ok(specs)
}

/// True when the format contains a field whose wire size is open-ended
/// (`v` or bare `a`), which the spec restricts to a single application of
/// the format (no cyclic repetition across an array of records).
fn has_open_ended_field(specs: &[FieldSpec]) -> bool {
    specs
        .iter()
        .any(|s| matches!(s, FieldSpec::OptUid | FieldSpec::VarStr))
}

/// Encodes `values` against `format`, writing to `dest` and returning the
/// number of bytes written. When the format has no open-ended field, it is
/// applied cyclically until `values` is exhausted (supporting arrays of
/// identical repeated structures); otherwise it is applied exactly once and
/// `values` must exactly match the format's field count.
pub fn encode_pd(format: &str, values: &[PdField], dest: &mut [u8]) -> Result<usize, FormatError> {
    let specs = parse_format(format)?;
    let non_literal: Vec<&FieldSpec> = specs.iter().filter(|s| !matches!(s, FieldSpec::Literal { .. })).collect();
    let open_ended = has_open_ended_field(&specs);

    if non_literal.is_empty() {
        // A pure-literal format still writes its literals once.
        return encode_one_pass(&specs, &[], dest);
    }

    if open_ended {
        return encode_one_pass(&specs, values, dest);
    }

    if values.len() % non_literal.len() != 0 {
        return Err(FormatError::ValueCountMismatch);
    }

    let mut written = 0;
    for chunk in values.chunks(non_literal.len()) {
        if written >= crate::codec::MAX_PDL {
            break;
        }
        written += encode_one_pass(&specs, chunk, &mut dest[written..])?;
    }
    Ok(written)
}

fn encode_one_pass(specs: &[FieldSpec], values: &[PdField], dest: &mut [u8]) -> Result<usize, FormatError> {
    let mut w = 0usize;
    let mut vi = 0usize;

    for spec in specs {
        match *spec {
            FieldSpec::Literal { bytes, len } => {
                dest[w..w + len].copy_from_slice(&bytes[8 - len..]);
                w += len;
            }
            FieldSpec::U8 => {
                let PdField::U8(v) = values.get(vi).ok_or(FormatError::ValueCountMismatch)? else {
                    return Err(FormatError::ValueTypeMismatch);
                };
                dest[w] = *v;
                w += 1;
                vi += 1;
            }
            FieldSpec::U16 => {
                let PdField::U16(v) = values.get(vi).ok_or(FormatError::ValueCountMismatch)? else {
                    return Err(FormatError::ValueTypeMismatch);
                };
                dest[w..w + 2].copy_from_slice(&v.to_be_bytes());
                w += 2;
                vi += 1;
            }
            FieldSpec::U32 => {
                let PdField::U32(v) = values.get(vi).ok_or(FormatError::ValueCountMismatch)? else {
                    return Err(FormatError::ValueTypeMismatch);
                };
                dest[w..w + 4].copy_from_slice(&v.to_be_bytes());
                w += 4;
                vi += 1;
            }
            FieldSpec::Uid => {
                let PdField::Uid(v) = values.get(vi).ok_or(FormatError::ValueCountMismatch)? else {
                    return Err(FormatError::ValueTypeMismatch);
                };
                dest[w..w + 6].copy_from_slice(&v.to_wire());
                w += 6;
                vi += 1;
            }
            FieldSpec::OptUid => {
                let field = values.get(vi).ok_or(FormatError::ValueCountMismatch)?;
                let PdField::OptUid(v) = field else {
                    return Err(FormatError::ValueTypeMismatch);
                };
                if let Some(uid) = v {
                    dest[w..w + 6].copy_from_slice(&uid.to_wire());
                    w += 6;
                }
                vi += 1;
            }
            FieldSpec::Str(n) => {
                let PdField::Str(s) = values.get(vi).ok_or(FormatError::ValueCountMismatch)? else {
                    return Err(FormatError::ValueTypeMismatch);
                };
                let bytes = s.as_bytes();
                let copy_len = bytes.len().min(n);
                dest[w..w + copy_len].copy_from_slice(&bytes[..copy_len]);
                dest[w + copy_len..w + n].fill(0);
                w += n;
                vi += 1;
            }
            FieldSpec::VarStr => {
                let PdField::Str(s) = values.get(vi).ok_or(FormatError::ValueCountMismatch)? else {
                    return Err(FormatError::ValueTypeMismatch);
                };
                let bytes = s.as_bytes();
                let remaining = crate::codec::MAX_PDL.saturating_sub(w).min(dest.len() - w);
                let copy_len = bytes.len().min(remaining);
                dest[w..w + copy_len].copy_from_slice(&bytes[..copy_len]);
                w += copy_len;
                vi += 1;
            }
        }
    }

    Ok(w)
}

/// Decodes `pd` against `format`, the symmetric counterpart to [`encode_pd`].
pub fn decode_pd(format: &str, pd: &[u8]) -> Result<Vec<PdField>, FormatError> {
    let specs = parse_format(format)?;
    let open_ended = has_open_ended_field(&specs);

    if open_ended {
        let (values, _consumed) = decode_one_pass(&specs, pd)?;
        return Ok(values);
    }

    let mut out = Vec::new();
    let mut offset = 0;
    while offset < pd.len() {
        let (values, consumed) = decode_one_pass(&specs, &pd[offset..])?;
        if consumed == 0 {
            break;
        }
        out.extend(values);
        offset += consumed;
    }
    Ok(out)
}

fn decode_one_pass(specs: &[FieldSpec], pd: &[u8]) -> Result<(Vec<PdField>, usize), FormatError> {
    let mut out = Vec::new();
    let mut r = 0usize;

    for spec in specs {
        match *spec {
            FieldSpec::Literal { len, .. } => {
                r += len.min(pd.len().saturating_sub(r));
            }
            FieldSpec::U8 => {
                let v = *pd.get(r).unwrap_or(&0);
                out.push(PdField::U8(v));
                r += 1;
            }
            FieldSpec::U16 => {
                let a = *pd.get(r).unwrap_or(&0);
                let b = *pd.get(r + 1).unwrap_or(&0);
                out.push(PdField::U16(u16::from_be_bytes([a, b])));
                r += 2;
            }
            FieldSpec::U32 => {
                let mut bytes = [0u8; 4];
                for (k, byte) in bytes.iter_mut().enumerate() {
                    *byte = *pd.get(r + k).unwrap_or(&0);
                }
                out.push(PdField::U32(u32::from_be_bytes(bytes)));
                r += 4;
            }
            FieldSpec::Uid => {
                let uid = Uid::from_wire_slice(&pd[r.min(pd.len())..]).unwrap_or(Uid::NULL);
                out.push(PdField::Uid(uid));
                r += 6;
            }
            FieldSpec::OptUid => {
                // A short or all-zero tail decodes to NULL, never an error:
                // the field was omitted from the wire because it was NULL.
                let uid = if r < pd.len() {
                    Uid::from_wire_slice(&pd[r..]).unwrap_or(Uid::NULL)
                } else {
                    Uid::NULL
                };
                out.push(PdField::OptUid(if uid.is_null() { None } else { Some(uid) }));
                r += 6;
            }
            FieldSpec::Str(n) => {
                let end = (r + n).min(pd.len());
                let start = r.min(pd.len());
                let s = String::from_utf8_lossy(&pd[start..end]).into_owned();
                out.push(PdField::Str(s));
                r += n;
            }
            FieldSpec::VarStr => {
                let start = r.min(pd.len());
                let s = String::from_utf8_lossy(&pd[start..]).into_owned();
                out.push(PdField::Str(s));
                r = pd.len();
            }
        }
    }

    Ok((out, r.min(pd.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip_mixed_fields() {
        let format = "bwdu";
        let values = [
            PdField::U8(0x42),
            PdField::U16(0x1234),
            PdField::U32(0xdead_beef),
            PdField::Uid(Uid::new(0x1234, 5)),
        ];
        let mut buf = [0u8; 32];
        let n = encode_pd(format, &values, &mut buf).unwrap();
        let decoded = decode_pd(format, &buf[..n]).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn optional_uid_omitted_when_null() {
        let format = "bv";
        let values = [PdField::U8(1), PdField::OptUid(None)];
        let mut buf = [0u8; 16];
        let n = encode_pd(format, &values, &mut buf).unwrap();
        assert_eq!(n, 1);
        let decoded = decode_pd(format, &buf[..n]).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn optional_uid_present_when_non_null() {
        let format = "bv";
        let uid = Uid::new(5, 6);
        let values = [PdField::U8(9), PdField::OptUid(Some(uid))];
        let mut buf = [0u8; 16];
        let n = encode_pd(format, &values, &mut buf).unwrap();
        assert_eq!(n, 7);
        let decoded = decode_pd(format, &buf[..n]).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn fixed_string_is_not_null_terminated() {
        let format = "a4";
        let values = [PdField::Str("hi".into())];
        let mut buf = [0u8; 16];
        let n = encode_pd(format, &values, &mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], b"hi\0\0");
    }

    #[test]
    fn variable_string_must_be_last() {
        assert_eq!(parse_format("ab").unwrap_err(), FormatError::VariableStringNotAtEnd);
    }

    #[test]
    fn optional_uid_must_be_last() {
        assert_eq!(parse_format("vb").unwrap_err(), FormatError::OptionalUidNotAtEnd);
    }

    #[test]
    fn zero_length_fixed_string_is_rejected() {
        assert_eq!(parse_format("a0").unwrap_err(), FormatError::FixedStringHasNoSize);
    }

    #[test]
    fn literal_is_skipped_on_decode() {
        let format = "#cc01h b";
        let format = format.replace(' ', "");
        let values = [PdField::U8(9)];
        let mut buf = [0u8; 16];
        let n = encode_pd(&format, &values, &mut buf).unwrap();
        assert_eq!(&buf[..2], &[0xcc, 0x01]);
        let decoded = decode_pd(&format, &buf[..n]).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn repeated_records_cycle_the_format() {
        let format = "bw";
        let values = [
            PdField::U8(1),
            PdField::U16(0x1000),
            PdField::U8(2),
            PdField::U16(0x2000),
        ];
        let mut buf = [0u8; 32];
        let n = encode_pd(format, &values, &mut buf).unwrap();
        assert_eq!(n, 6);
        let decoded = decode_pd(format, &buf[..n]).unwrap();
        assert_eq!(decoded, values);
    }
}
