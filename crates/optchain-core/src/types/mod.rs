//! 수집 파이프라인 전반에서 사용되는 공통 타입.

mod clock;
mod snapshot;
mod ticker;
mod window;

pub use clock::*;
pub use snapshot::*;
pub use ticker::*;
pub use window::*;
