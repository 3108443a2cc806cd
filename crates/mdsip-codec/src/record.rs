//! CLASS_R codec: named composite records.
//!
//! A record is a 12-byte header (common header plus a descriptor count),
//! a table of absolute field offsets, an optional inline scalar (the
//! function opcode or the dispatch/dependency/condition/call type byte),
//! then the packed field descriptors. A zero offset marks an omitted
//! field; trailing omitted fields may be absent from the table entirely.

use bytes::{BufMut, BytesMut};

use crate::descriptor::{span, Descriptor, DscHeader};
use crate::error::{CodecError, Result};
use crate::registry::{class, dtype};

/// Size of the record header: common header plus the ndesc word.
const RECORD_HEADER_SIZE: usize = 12;

/// The inline scalar some record dtypes carry next to their fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inline {
    Byte(u8),
    Word(u16),
}

/// One of the composite expression node types.
///
/// Field order matches the wire layout; omitted fields hold
/// [`Descriptor::Missing`].
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Signal {
        value: Descriptor,
        raw: Descriptor,
        dimensions: Vec<Descriptor>,
    },
    Dimension {
        window: Descriptor,
        axis: Descriptor,
    },
    Window {
        start_idx: Descriptor,
        end_idx: Descriptor,
        value_at_idx0: Descriptor,
    },
    /// Repeated (slope, begin, ending) triplets.
    Slope {
        segments: Vec<(Descriptor, Descriptor, Descriptor)>,
    },
    Function {
        opcode: u16,
        arguments: Vec<Descriptor>,
    },
    Conglom {
        image: Descriptor,
        model: Descriptor,
        name: Descriptor,
        qualifiers: Descriptor,
    },
    Range {
        begin: Descriptor,
        ending: Descriptor,
        delta: Descriptor,
    },
    Action {
        dispatch: Descriptor,
        task: Descriptor,
        errorlogs: Descriptor,
        completion_message: Descriptor,
        performance: Descriptor,
    },
    Dispatch {
        sched_type: u8,
        ident: Descriptor,
        phase: Descriptor,
        when: Descriptor,
        completion: Descriptor,
    },
    Program {
        time_out: Descriptor,
        program: Descriptor,
    },
    Routine {
        time_out: Descriptor,
        image: Descriptor,
        routine: Descriptor,
        arguments: Vec<Descriptor>,
    },
    Procedure {
        time_out: Descriptor,
        language: Descriptor,
        procedure: Descriptor,
        arguments: Vec<Descriptor>,
    },
    Method {
        time_out: Descriptor,
        method: Descriptor,
        device: Descriptor,
    },
    Dependency {
        dep_type: u8,
        arguments: Vec<Descriptor>,
    },
    Condition {
        cond_type: u8,
        condition: Descriptor,
    },
    WithUnits {
        value: Descriptor,
        units: Descriptor,
    },
    Call {
        return_dtype: u8,
        image: Descriptor,
        routine: Descriptor,
        arguments: Vec<Descriptor>,
    },
    WithError {
        value: Descriptor,
        error: Descriptor,
    },
    Opaque {
        value: Descriptor,
        opaque_type: Descriptor,
    },
}

impl Record {
    pub fn dtype(&self) -> u8 {
        match self {
            Record::Signal { .. } => dtype::SIGNAL,
            Record::Dimension { .. } => dtype::DIMENSION,
            Record::Window { .. } => dtype::WINDOW,
            Record::Slope { .. } => dtype::SLOPE,
            Record::Function { .. } => dtype::FUNCTION,
            Record::Conglom { .. } => dtype::CONGLOM,
            Record::Range { .. } => dtype::RANGE,
            Record::Action { .. } => dtype::ACTION,
            Record::Dispatch { .. } => dtype::DISPATCH,
            Record::Program { .. } => dtype::PROGRAM,
            Record::Routine { .. } => dtype::ROUTINE,
            Record::Procedure { .. } => dtype::PROCEDURE,
            Record::Method { .. } => dtype::METHOD,
            Record::Dependency { .. } => dtype::DEPENDENCY,
            Record::Condition { .. } => dtype::CONDITION,
            Record::WithUnits { .. } => dtype::WITH_UNITS,
            Record::Call { .. } => dtype::CALL,
            Record::WithError { .. } => dtype::WITH_ERROR,
            Record::Opaque { .. } => dtype::OPAQUE,
        }
    }

    fn inline(&self) -> Option<Inline> {
        match self {
            Record::Function { opcode, .. } => Some(Inline::Word(*opcode)),
            Record::Dispatch { sched_type, .. } => Some(Inline::Byte(*sched_type)),
            Record::Dependency { dep_type, .. } => Some(Inline::Byte(*dep_type)),
            Record::Condition { cond_type, .. } => Some(Inline::Byte(*cond_type)),
            Record::Call { return_dtype, .. } => Some(Inline::Byte(*return_dtype)),
            _ => None,
        }
    }

    /// The field descriptors in wire order.
    pub fn fields(&self) -> Vec<&Descriptor> {
        match self {
            Record::Signal {
                value,
                raw,
                dimensions,
            } => {
                let mut out = vec![value, raw];
                out.extend(dimensions);
                out
            }
            Record::Dimension { window, axis } => vec![window, axis],
            Record::Window {
                start_idx,
                end_idx,
                value_at_idx0,
            } => vec![start_idx, end_idx, value_at_idx0],
            Record::Slope { segments } => segments
                .iter()
                .flat_map(|(s, b, e)| [s, b, e])
                .collect(),
            Record::Function { arguments, .. } => arguments.iter().collect(),
            Record::Conglom {
                image,
                model,
                name,
                qualifiers,
            } => vec![image, model, name, qualifiers],
            Record::Range {
                begin,
                ending,
                delta,
            } => vec![begin, ending, delta],
            Record::Action {
                dispatch,
                task,
                errorlogs,
                completion_message,
                performance,
            } => vec![dispatch, task, errorlogs, completion_message, performance],
            Record::Dispatch {
                ident,
                phase,
                when,
                completion,
                ..
            } => vec![ident, phase, when, completion],
            Record::Program { time_out, program } => vec![time_out, program],
            Record::Routine {
                time_out,
                image,
                routine,
                arguments,
            } => {
                let mut out = vec![time_out, image, routine];
                out.extend(arguments);
                out
            }
            Record::Procedure {
                time_out,
                language,
                procedure,
                arguments,
            } => {
                let mut out = vec![time_out, language, procedure];
                out.extend(arguments);
                out
            }
            Record::Method {
                time_out,
                method,
                device,
            } => vec![time_out, method, device],
            Record::Dependency { arguments, .. } => arguments.iter().collect(),
            Record::Condition { condition, .. } => vec![condition],
            Record::WithUnits { value, units } => vec![value, units],
            Record::Call {
                image,
                routine,
                arguments,
                ..
            } => {
                let mut out = vec![image, routine];
                out.extend(arguments);
                out
            }
            Record::WithError { value, error } => vec![value, error],
            Record::Opaque { value, opaque_type } => vec![value, opaque_type],
        }
    }
}

/// Pack a record as a full CLASS_R descriptor.
pub(crate) fn pack(record: &Record, dst: &mut BytesMut) -> Result<()> {
    let fields = record.fields();
    let ndesc = fields.len();
    if ndesc > u8::MAX as usize {
        return Err(CodecError::Malformed("too many record fields"));
    }

    let inline = record.inline();
    let inline_size = match inline {
        None => 0,
        Some(Inline::Byte(_)) => 1,
        Some(Inline::Word(_)) => 2,
    };
    let data_base = RECORD_HEADER_SIZE + 4 * ndesc;

    DscHeader {
        length: inline_size as u16,
        dtype: record.dtype(),
        class: class::R,
        offset: if inline.is_some() { data_base as u32 } else { 0 },
    }
    .put(dst);
    // ndesc occupies the low 8 bits; the rest of the word is fill.
    dst.put_u32_le(ndesc as u32);

    let children: Vec<Option<Vec<u8>>> = fields
        .iter()
        .map(|f| {
            if f.is_missing() {
                Ok(None)
            } else {
                f.pack().map(|b| Some(b.to_vec()))
            }
        })
        .collect::<Result<_>>()?;

    let mut next = data_base + inline_size;
    for child in &children {
        match child {
            Some(bytes) => {
                dst.put_u32_le(next as u32);
                next += bytes.len();
            }
            None => dst.put_u32_le(0),
        }
    }

    match inline {
        Some(Inline::Byte(v)) => dst.put_u8(v),
        Some(Inline::Word(v)) => dst.put_u16_le(v),
        None => {}
    }
    for child in children.into_iter().flatten() {
        dst.put_slice(&child);
    }
    Ok(())
}

/// Unpack a full CLASS_R descriptor.
pub(crate) fn unpack(header: &DscHeader, buf: &[u8], depth: usize) -> Result<Record> {
    let ndesc = {
        let word = span(buf, 8, 4)?;
        (u32::from_le_bytes([word[0], word[1], word[2], word[3]]) & 0xFF) as usize
    };

    let inline = match header.length {
        0 => None,
        1 => Some(Inline::Byte(span(buf, header.offset as usize, 1)?[0])),
        2 => {
            let raw = span(buf, header.offset as usize, 2)?;
            Some(Inline::Word(u16::from_le_bytes([raw[0], raw[1]])))
        }
        _ => return Err(CodecError::Malformed("unexpected inline value width")),
    };

    let table = span(buf, RECORD_HEADER_SIZE, 4 * ndesc)?;
    let mut fields = Vec::with_capacity(ndesc);
    for raw in table.chunks_exact(4) {
        let offset = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        if offset == 0 {
            fields.push(Descriptor::Missing);
        } else {
            let nested = buf
                .get(offset..)
                .ok_or(CodecError::Malformed("field offset outside the descriptor"))?;
            fields.push(Descriptor::unpack_at(nested, depth + 1)?);
        }
    }

    from_parts(header.dtype, inline, fields)
}

/// Assemble a record from its dtype, optional inline scalar and
/// positional fields.
fn from_parts(dtype_id: u8, inline: Option<Inline>, fields: Vec<Descriptor>) -> Result<Record> {
    let inline_word = match inline {
        None => None,
        Some(Inline::Byte(v)) => Some(v as u16),
        Some(Inline::Word(v)) => Some(v),
    };

    // Only a handful of dtypes carry an inline value; anything else with
    // one is inconsistent.
    let takes_inline = matches!(
        dtype_id,
        dtype::FUNCTION | dtype::DISPATCH | dtype::DEPENDENCY | dtype::CONDITION | dtype::CALL
    );
    if inline.is_some() && !takes_inline {
        return Err(CodecError::Malformed(
            "inline value on a record dtype that takes none",
        ));
    }

    fn next(it: &mut std::vec::IntoIter<Descriptor>) -> Descriptor {
        it.next().unwrap_or(Descriptor::Missing)
    }

    let mut it = fields.into_iter();
    let record = match dtype_id {
        dtype::SIGNAL => Record::Signal {
            value: next(&mut it),
            raw: next(&mut it),
            dimensions: it.by_ref().collect(),
        },
        dtype::DIMENSION => Record::Dimension {
            window: next(&mut it),
            axis: next(&mut it),
        },
        dtype::WINDOW => Record::Window {
            start_idx: next(&mut it),
            end_idx: next(&mut it),
            value_at_idx0: next(&mut it),
        },
        dtype::SLOPE => {
            let all: Vec<Descriptor> = it.by_ref().collect();
            if all.len() % 3 != 0 {
                return Err(CodecError::Malformed(
                    "slope fields must come in triplets",
                ));
            }
            let mut segments = Vec::with_capacity(all.len() / 3);
            let mut parts = all.into_iter();
            while let (Some(s), Some(b), Some(e)) = (parts.next(), parts.next(), parts.next()) {
                segments.push((s, b, e));
            }
            return Ok(Record::Slope { segments });
        }
        dtype::FUNCTION => Record::Function {
            opcode: inline_word.unwrap_or(0),
            arguments: it.by_ref().collect(),
        },
        dtype::CONGLOM => Record::Conglom {
            image: next(&mut it),
            model: next(&mut it),
            name: next(&mut it),
            qualifiers: next(&mut it),
        },
        dtype::RANGE => Record::Range {
            begin: next(&mut it),
            ending: next(&mut it),
            delta: next(&mut it),
        },
        dtype::ACTION => Record::Action {
            dispatch: next(&mut it),
            task: next(&mut it),
            errorlogs: next(&mut it),
            completion_message: next(&mut it),
            performance: next(&mut it),
        },
        dtype::DISPATCH => Record::Dispatch {
            sched_type: inline_word.unwrap_or(0) as u8,
            ident: next(&mut it),
            phase: next(&mut it),
            when: next(&mut it),
            completion: next(&mut it),
        },
        dtype::PROGRAM => Record::Program {
            time_out: next(&mut it),
            program: next(&mut it),
        },
        dtype::ROUTINE => Record::Routine {
            time_out: next(&mut it),
            image: next(&mut it),
            routine: next(&mut it),
            arguments: it.by_ref().collect(),
        },
        dtype::PROCEDURE => Record::Procedure {
            time_out: next(&mut it),
            language: next(&mut it),
            procedure: next(&mut it),
            arguments: it.by_ref().collect(),
        },
        dtype::METHOD => Record::Method {
            time_out: next(&mut it),
            method: next(&mut it),
            device: next(&mut it),
        },
        dtype::DEPENDENCY => Record::Dependency {
            dep_type: inline_word.unwrap_or(0) as u8,
            arguments: it.by_ref().collect(),
        },
        dtype::CONDITION => Record::Condition {
            cond_type: inline_word.unwrap_or(0) as u8,
            condition: next(&mut it),
        },
        dtype::WITH_UNITS => Record::WithUnits {
            value: next(&mut it),
            units: next(&mut it),
        },
        dtype::CALL => Record::Call {
            return_dtype: inline_word.unwrap_or(u16::from(dtype::L)) as u8,
            image: next(&mut it),
            routine: next(&mut it),
            arguments: it.by_ref().collect(),
        },
        dtype::WITH_ERROR => Record::WithError {
            value: next(&mut it),
            error: next(&mut it),
        },
        dtype::OPAQUE => Record::Opaque {
            value: next(&mut it),
            opaque_type: next(&mut it),
        },
        other => {
            return Err(CodecError::UnknownDtypeForClass {
                class: class::R,
                dtype: other,
            })
        }
    };

    // Fixed-arity records must not carry extra fields.
    if it.next().is_some() {
        return Err(CodecError::Malformed("too many record fields for dtype"));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{Array, ArrayData};
    use crate::scalar::Scalar;

    fn scalar(v: i32) -> Descriptor {
        Descriptor::Scalar(Scalar::Int32(v))
    }

    fn roundtrip(record: Record) {
        let packed = Descriptor::from(record.clone()).pack().unwrap();
        assert_eq!(
            Descriptor::unpack(&packed).unwrap(),
            Descriptor::from(record)
        );
    }

    #[test]
    fn roundtrip_signal_with_dimensions() {
        roundtrip(Record::Signal {
            value: Descriptor::Missing,
            raw: Descriptor::Array(Array::vector(ArrayData::Float32(vec![1.0, 2.0]))),
            dimensions: vec![
                Descriptor::Array(Array::vector(ArrayData::UInt64(vec![0, 1]))),
                Descriptor::Missing,
            ],
        });
    }

    #[test]
    fn roundtrip_range() {
        roundtrip(Record::Range {
            begin: scalar(0),
            ending: scalar(100),
            delta: scalar(5),
        });
    }

    #[test]
    fn roundtrip_function_with_opcode() {
        roundtrip(Record::Function {
            opcode: 38,
            arguments: vec![scalar(1), scalar(2)],
        });
    }

    #[test]
    fn roundtrip_dispatch_inline_byte() {
        let record = Record::Dispatch {
            sched_type: 2,
            ident: Descriptor::Scalar(Scalar::Text("SRV".into())),
            phase: Descriptor::Scalar(Scalar::Text("INIT".into())),
            when: scalar(10),
            completion: Descriptor::Missing,
        };
        let packed = Descriptor::from(record.clone()).pack().unwrap();
        // length=1 and offset pointing past the four offset slots.
        assert_eq!(packed[0], 1);
        assert_eq!(
            u32::from_le_bytes([packed[4], packed[5], packed[6], packed[7]]),
            12 + 4 * 4
        );
        assert_eq!(
            Descriptor::unpack(&packed).unwrap(),
            Descriptor::from(record)
        );
    }

    #[test]
    fn roundtrip_nested_records() {
        roundtrip(Record::WithUnits {
            value: Descriptor::from(Record::WithError {
                value: scalar(1),
                error: Descriptor::Missing,
            }),
            units: Descriptor::Scalar(Scalar::Text("V".into())),
        });
    }

    #[test]
    fn roundtrip_slope_segments() {
        roundtrip(Record::Slope {
            segments: vec![(scalar(1), scalar(0), scalar(10))],
        });
    }

    #[test]
    fn roundtrip_call_with_return_dtype() {
        roundtrip(Record::Call {
            return_dtype: dtype::W,
            image: Descriptor::Scalar(Scalar::Text("libfoo".into())),
            routine: Descriptor::Scalar(Scalar::Text("bar".into())),
            arguments: vec![scalar(7)],
        });
    }

    #[test]
    fn call_without_inline_defaults_to_long() {
        let record = Record::Call {
            return_dtype: dtype::B,
            image: Descriptor::Missing,
            routine: Descriptor::Scalar(Scalar::Text("baz".into())),
            arguments: vec![],
        };
        let mut raw = Descriptor::from(record).pack().unwrap().to_vec();
        // Drop the inline value; the return type falls back to LONG.
        raw[0] = 0;
        raw[4..8].copy_from_slice(&[0; 4]);
        match Descriptor::unpack(&raw).unwrap() {
            Descriptor::Record(record) => match *record {
                Record::Call { return_dtype, .. } => assert_eq!(return_dtype, dtype::L),
                other => panic!("unexpected record: {other:?}"),
            },
            other => panic!("unexpected descriptor: {other:?}"),
        }
    }

    #[test]
    fn missing_trailing_fields_default() {
        // A Window packed with only its first field decodes with the
        // rest omitted.
        let record = Record::Window {
            start_idx: scalar(1),
            end_idx: Descriptor::Missing,
            value_at_idx0: Descriptor::Missing,
        };
        let packed = Descriptor::from(record.clone()).pack().unwrap();
        assert_eq!(
            Descriptor::unpack(&packed).unwrap(),
            Descriptor::from(record)
        );
    }

    #[test]
    fn extra_fields_on_fixed_arity_rejected() {
        // Hand-build a RANGE with four field slots.
        let record = Record::Conglom {
            image: scalar(1),
            model: scalar(2),
            name: scalar(3),
            qualifiers: scalar(4),
        };
        let mut raw = Descriptor::from(record).pack().unwrap().to_vec();
        raw[2] = dtype::RANGE;
        assert!(matches!(
            Descriptor::unpack(&raw).unwrap_err(),
            CodecError::Malformed("too many record fields for dtype")
        ));
    }

    #[test]
    fn slope_triplet_count_enforced() {
        let record = Record::Dimension {
            window: scalar(1),
            axis: scalar(2),
        };
        let mut raw = Descriptor::from(record).pack().unwrap().to_vec();
        raw[2] = dtype::SLOPE;
        assert!(matches!(
            Descriptor::unpack(&raw).unwrap_err(),
            CodecError::Malformed("slope fields must come in triplets")
        ));
    }

    #[test]
    fn inline_on_plain_record_rejected() {
        let record = Record::Condition {
            cond_type: 1,
            condition: scalar(1),
        };
        let mut raw = Descriptor::from(record).pack().unwrap().to_vec();
        raw[2] = dtype::WITH_UNITS;
        assert!(matches!(
            Descriptor::unpack(&raw).unwrap_err(),
            CodecError::Malformed("inline value on a record dtype that takes none")
        ));
    }
}
