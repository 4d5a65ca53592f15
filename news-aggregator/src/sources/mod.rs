pub mod hacker_news;
pub mod rss_feed;

pub use hacker_news::HackerNewsAdapter;
pub use rss_feed::FeedAdapter;
