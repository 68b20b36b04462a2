pub mod cancel;
pub mod codec;
pub mod conversion_api;
pub mod events;
pub mod formats;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use cancel::CancelToken;
pub use codec::{ImageCodec, StandardCodec};
pub use conversion_api::{
    execute, plan_output, ConversionOptions, ConversionResult, FileTask, Outcome, SkipReason,
};
pub use events::{ChannelSink, ConversionEvent, EventSink, TracingSink};
pub use formats::OutputFormat;
pub use scheduler::{progress_percent, BatchScheduler, BatchSummary};

pub use shared_utils::errors::ConvertError;
pub use shared_utils::img_errors::CodecError;
