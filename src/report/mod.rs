pub mod event_bus;
pub mod report;

pub use event_bus::{EventBus, LineSink};
pub use report::{InstrumentationSummary, Report, TestDescriptor};
