mod device_handle;
mod sensor_handle;
mod workspace_handle;

pub use device_handle::*;
pub use sensor_handle::*;
pub use workspace_handle::*;
