mod scan_event;
mod short_link;

pub use scan_event::{
    ClientInfo, NewScanEvent, Pagination, ScanEvent, ScanJob, ScanLogDto, ScanPage,
    ScanQueryParams,
};
#[cfg(test)]
pub use scan_event::{NO_REFERRER, UNKNOWN_USER_AGENT};
pub use short_link::ShortLink;
