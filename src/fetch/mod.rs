//! Fetch orchestration
//!
//! URL composition, request options, observable state and the [`Fetcher`]
//! that ties them to a [`Transport`](crate::network::Transport) and the
//! response cache.

mod cancel;
mod fetcher;
mod options;
mod state;
mod url;

pub use cancel::CancellationToken;
pub use fetcher::{Fetcher, FetcherBuilder, Payload, UrlSource};
pub use options::{ExecuteOverrides, FetchOptions, RequestOptions, Transform};
pub use state::RequestState;
pub use url::{
    build_url, has_scheme, join_base, params, query_string, substitute_path_params, ParamValue,
    Params,
};
