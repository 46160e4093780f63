mod link;

pub use link::{CampaignTags, CreateLinkRequest, ShortLink, UtmParams};
