//! Driven adapters: upstream HTTP connectors and PostgreSQL persistence.
//!
//! Adapters implement the domain's ports and translate between external
//! representations (Overpass JSON, Open-Meteo archive arrays, PostGIS rows)
//! and domain types. No business logic resides here.

pub mod openmeteo;
pub mod overpass;
pub mod persistence;
