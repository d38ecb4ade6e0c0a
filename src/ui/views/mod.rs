mod listing_detail;
mod listing_list;
mod profile;

pub use listing_detail::ListingDetailView;
pub use listing_list::ListingListView;
pub use profile::ProfileView;
