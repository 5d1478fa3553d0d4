//! Fuzz target for observation document parsing.
//!
//! Tests that the JSON feed parses arbitrary input and filters any window
//! without panicking.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use popp_common::RegionId;
use popp_core::feed::{JsonObservationFeed, ObservationFeed};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    document: &'a str,
    region: &'a str,
    start: i64,
    end: i64,
}

fuzz_target!(|input: Input<'_>| {
    let Ok(feed) = JsonObservationFeed::from_json(input.document) else {
        return;
    };
    let Ok(region) = RegionId::new(input.region) else {
        return;
    };
    if let Ok(observations) = feed.observations(&region, input.start, input.end) {
        assert!(observations
            .keys()
            .all(|t| *t >= input.start && *t < input.end));
    }
});
