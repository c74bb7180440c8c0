// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Reading and writing tables of the ALMA Science Data Model (ASDM).

An ASDM dataset is a directory of tables. Each table is stored either as an
XML document, with one `<row>` element per row, or as a two-part MIME message
whose XML header describes a binary payload of rows. This crate provides the
engine for both forms, generic over the row type of a table, along with the
CalAtmosphere table built on top of it.

```rust,ignore
use rubbl_asdm::{CalAtmosphereTable, Container};
use rubbl_core::notify::NoopNotificationBackend;
use std::rc::Rc;

let mut table = CalAtmosphereTable::new(Rc::new(Container::default()));
table.set_from_file("uid___A002_X1/", &mut NoopNotificationBackend::new())?;

for row in table.rows() {
    println!("{} {}", row.antenna_name, row.receiver_band);
}
```

*/

// These come first to provide macros for the other modules.
#[macro_use]
pub mod errors;
#[macro_use]
pub mod values;

pub mod entity;
pub mod enums;
pub mod mime;
pub mod types;
pub mod xml;

#[macro_use]
pub mod row;

pub mod calatmosphere;
pub mod container;
pub mod table;

pub use calatmosphere::{CalAtmosphereRow, CalAtmosphereTable};
pub use container::Container;
pub use entity::{Entity, EntityId};
pub use errors::{AsdmError, Result};
pub use row::AsdmRow;
pub use table::{PartialEmitPolicy, PartialLoadPolicy, Table};
