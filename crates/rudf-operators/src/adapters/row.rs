//! Row-shaped adapters: the user function returns a generator that is
//! called without arguments until it signals end-of-stream.

use std::sync::Arc;

use rudf_core::guest::GuestValue;
use rudf_core::types::Row;
use rudf_marshal::{row_from_guest, row_to_guest, RowLayout};

use super::{load_udf, port_arg};
use crate::env::UdfEnv;
use crate::traits::{OpError, Operator, Port, RowSource, RowStream, TupleOperator};

/// Drains a guest generator into native rows.
///
/// Stops at the first end-of-stream marker or error. Streams the guest left
/// open are released when the generator ends or the iterator is dropped.
pub struct GuestRowStream {
    env: UdfEnv,
    generator: GuestValue,
    layout: RowLayout,
    yielded: usize,
    done: bool,
}

impl GuestRowStream {
    pub fn new(env: UdfEnv, generator: GuestValue, layout: RowLayout) -> Self {
        Self {
            env,
            generator,
            layout,
            yielded: 0,
            done: false,
        }
    }

    /// Call `function` and wrap the generator it returns. Streams the guest
    /// opened are released here when the call itself fails.
    pub fn start(
        env: &UdfEnv,
        function: &GuestValue,
        args: &[GuestValue],
        layout: RowLayout,
    ) -> Result<RowStream, OpError> {
        match env.session().call(function, args) {
            Ok(generator) => Ok(Box::new(Self::new(env.clone(), generator, layout))),
            Err(e) => {
                env.release_streams();
                Err(e.into())
            }
        }
    }

    fn pull(&self) -> Result<Option<Row>, OpError> {
        let record = self.env.session().call(&self.generator, &[])?;
        Ok(row_from_guest(&record, &self.layout)?)
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.env.release_streams();
            self.env.session().release(&self.generator);
            tracing::debug!(rows = self.yielded, "guest generator finished");
        }
    }
}

impl Iterator for GuestRowStream {
    type Item = Result<Row, OpError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.pull() {
            Ok(Some(row)) => {
                self.yielded += 1;
                tracing::trace!(row = self.yielded, "yielded row");
                Some(Ok(row))
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl Drop for GuestRowStream {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Row in, rows out: calls `fn(record, port)` per input row.
#[derive(Debug)]
pub struct RowUdf {
    env: UdfEnv,
    function: GuestValue,
}

impl RowUdf {
    pub fn new(env: UdfEnv, source: &str) -> Result<Self, OpError> {
        let function = load_udf(&env, source)?;
        Ok(Self { env, function })
    }

    pub fn env(&self) -> &UdfEnv {
        &self.env
    }
}

impl Operator for RowUdf {
    fn name(&self) -> &'static str {
        "row_udf"
    }

    fn is_source(&self) -> bool {
        false
    }
}

impl TupleOperator for RowUdf {
    fn process_tuple(&self, row: &Row, port: Port) -> Result<RowStream, OpError> {
        tracing::debug!(port, fields = row.len(), "invoking row function");
        let record = row_to_guest(row)?;
        GuestRowStream::start(
            &self.env,
            &self.function,
            &[record, port_arg(port)?],
            RowLayout::Operator(Arc::clone(row.schema())),
        )
    }
}

/// No input, rows out: calls `fn()` once per `produce`.
#[derive(Debug)]
pub struct RowSourceUdf {
    env: UdfEnv,
    function: GuestValue,
}

impl RowSourceUdf {
    pub fn new(env: UdfEnv, source: &str) -> Result<Self, OpError> {
        let function = load_udf(&env, source)?;
        Ok(Self { env, function })
    }

    pub fn env(&self) -> &UdfEnv {
        &self.env
    }
}

impl Operator for RowSourceUdf {
    fn name(&self) -> &'static str {
        "row_source_udf"
    }

    fn is_source(&self) -> bool {
        true
    }
}

impl RowSource for RowSourceUdf {
    fn produce(&self) -> Result<RowStream, OpError> {
        tracing::debug!("invoking row source");
        GuestRowStream::start(&self.env, &self.function, &[], RowLayout::Source)
    }
}
