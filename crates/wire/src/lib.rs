//! Plexus Wire - Wire scalar codec for the plexus sync layer.
//!
//! Translates the legacy wire encodings (sentinel nulls, tagged embedded
//! JSON, flattened nested-object keys) to and from native values. See
//! [`codec`] for the encoding rules.

mod codec;

pub use codec::{
    collapse_flattened, decode_value, encode_bool, encode_null, encode_number, escape_embedded,
    tag_json, unescape_embedded,
};
