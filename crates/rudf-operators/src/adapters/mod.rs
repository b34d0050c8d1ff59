//! The four execution adapters.

mod row;
mod table;

pub use row::{GuestRowStream, RowSourceUdf, RowUdf};
pub use table::{TableSourceUdf, TableUdf};

use rudf_core::guest::GuestValue;

use crate::env::UdfEnv;
use crate::traits::{OpError, Port};

/// Install the large-object API, then evaluate `source` into the user's
/// function.
fn load_udf(env: &UdfEnv, source: &str) -> Result<GuestValue, OpError> {
    env.install()?;
    let function = env.session().load_function(source)?;
    tracing::debug!(runtime = env.session().runtime_name(), "loaded user function");
    Ok(function)
}

fn port_arg(port: Port) -> Result<GuestValue, OpError> {
    i32::try_from(port)
        .map(GuestValue::integer)
        .map_err(|_| OpError::Exec(format!("port {port} does not fit a guest integer")))
}
