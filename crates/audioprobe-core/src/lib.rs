pub mod backend;
mod buffer;
pub mod device;
pub mod level;
pub mod probe;
pub mod tone;
pub mod util;

pub use backend::{AudioBackend, RecordRequest};
pub use buffer::SampleBuffer;
pub use device::{DeviceInfo, DeviceList, SortKey};
pub use tone::ToneConfig;
