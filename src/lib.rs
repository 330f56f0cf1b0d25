pub mod bitreader;
pub mod bitwriter;
pub mod cli;
pub mod discover;
pub mod eg;
pub mod nal;
pub mod patch;
pub mod pipeline;
pub mod rewriter;
pub mod scan;
pub mod sei;
pub mod sps;
pub mod timecode;

pub use nal::{Nal, NalUnitType};
pub use rewriter::{AccessUnitRewriter, RewriterConfig};
pub use sps::{Sps, SpsVuiInfo};
pub use timecode::TimecodeSample;

use thiserror::Error as ThisError;

/// Failure modes of the bit-level H.264 machinery, matched one-to-one to
/// the dispositions the access unit rewriter applies on each (see
/// [`rewriter`] module docs): most are absorbed into a pass-through rather
/// than propagated to the caller.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("malformed Annex B stream: {0}")]
    MalformedAnnexB(String),
    #[error("truncated NAL unit")]
    TruncatedNal,
    #[error("invalid NAL header")]
    InvalidNalHeader,
    #[error("SPS parse failure: {0}")]
    SpsParseFailure(String),
    #[error("malformed SPS: {0}")]
    MalformedSps(String),
    #[error("VUI absent")]
    VuiAbsent,
    #[error("SPS patch failure: {0}")]
    PatchFailure(String),
    #[error("output buffer allocation failure")]
    AllocFailure,
    #[error("no timecode source available")]
    NoTimecode,
    #[error("bitstream error: {0}")]
    BitstreamError(String),
    #[error("unexpected end of bitstream")]
    UnexpectedEof,
}

pub type Result<T> = std::result::Result<T, Error>;
