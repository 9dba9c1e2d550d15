pub mod cv;
pub mod job_offer;

pub use cv::CvRow;
pub use job_offer::JobOfferRow;
