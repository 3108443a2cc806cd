/// Errors that can occur while packing or unpacking descriptors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The class byte does not name a known descriptor class.
    #[error("unknown descriptor class {class}")]
    UnknownClass { class: u8 },

    /// The dtype byte is not valid for the descriptor class it appears in.
    #[error("dtype {dtype} is not valid for class {class}")]
    UnknownDtypeForClass { class: u8, dtype: u8 },

    /// The descriptor uses a legacy feature this codec does not implement.
    #[error("unsupported descriptor feature: {0}")]
    UnsupportedFeature(&'static str),

    /// Fewer bytes are available than the descriptor declares.
    #[error("truncated descriptor: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    /// The bytes are structurally inconsistent and can never decode.
    #[error("malformed descriptor: {0}")]
    Malformed(&'static str),

    /// Text payloads must be ASCII.
    #[error("text contains non-ASCII bytes")]
    NonAsciiText,
}

pub type Result<T> = std::result::Result<T, CodecError>;
