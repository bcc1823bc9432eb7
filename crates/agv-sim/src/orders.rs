//! Order file loading.  Parsing of individual lines is deferred to the task
//! generator; see [`agv_fleet::generator`] for the format.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use agv_fleet::read_order_records;
use csv::StringRecord;

use crate::{SimError, SimResult};

pub fn load_orders(path: impl AsRef<Path>) -> SimResult<Vec<StringRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| SimError::Orders { file: path.display().to_string(), source })?;
    load_orders_reader(file)
}

pub fn load_orders_reader<R: Read>(reader: R) -> SimResult<Vec<StringRecord>> {
    Ok(read_order_records(reader)?)
}
