//! Client tests against an in-process GoTrue stand-in.

mod flows;
