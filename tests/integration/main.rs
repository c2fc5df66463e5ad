//! Integration tests, compiled as a single test target.

mod mock_source;
mod pipeline;
