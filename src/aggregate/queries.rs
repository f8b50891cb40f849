use super::{AggregateSpec, Direction, Reducer, SortBy};
use crate::process::schema::{CUSTOMER_ID, PRODUCT_ID_UPPER, RATING, REVIEW_DATE};

pub const DAILY_REVIEW_COUNTS_DIR: &str = "daily_review_counts";
pub const TOP_CUSTOMERS_DIR: &str = "top_5_customers";
pub const RATING_DISTRIBUTION_DIR: &str = "rating_distribution";

pub const TOP_CUSTOMERS_LIMIT: usize = 5;

/// Mean rating and review count per product, best rated first.
pub const AVERAGE_RATING_PER_PRODUCT: AggregateSpec = AggregateSpec {
    name: "average_rating_per_product",
    subpath: None,
    key: PRODUCT_ID_UPPER,
    reducer: Reducer::MeanWithCount {
        value: RATING,
        mean_output: "average_rating",
        count_output: "review_count",
    },
    order: SortBy::Mean(Direction::Desc),
    limit: None,
};

/// Reviews per calendar day; the unparseable-date group sorts first.
pub const DAILY_REVIEW_COUNTS: AggregateSpec = AggregateSpec {
    name: "daily_review_counts",
    subpath: Some(DAILY_REVIEW_COUNTS_DIR),
    key: REVIEW_DATE,
    reducer: Reducer::Count {
        output: "review_count",
    },
    order: SortBy::Key(Direction::Asc),
    limit: None,
};

pub const TOP_CUSTOMERS: AggregateSpec = AggregateSpec {
    name: "top_5_customers",
    subpath: Some(TOP_CUSTOMERS_DIR),
    key: CUSTOMER_ID,
    reducer: Reducer::Count {
        output: "review_count",
    },
    order: SortBy::Count(Direction::Desc),
    limit: Some(TOP_CUSTOMERS_LIMIT),
};

/// Row count per star rating; the 0 bucket holds every missing or invalid rating.
pub const RATING_DISTRIBUTION: AggregateSpec = AggregateSpec {
    name: "rating_distribution",
    subpath: Some(RATING_DISTRIBUTION_DIR),
    key: RATING,
    reducer: Reducer::Count {
        output: "rating_count",
    },
    order: SortBy::Key(Direction::Asc),
    limit: None,
};

/// The four analytics views, in write order.
pub const REVIEW_AGGREGATES: [AggregateSpec; 4] = [
    AVERAGE_RATING_PER_PRODUCT,
    DAILY_REVIEW_COUNTS,
    TOP_CUSTOMERS,
    RATING_DISTRIBUTION,
];
