//! Generated protobuf types for the provider's virtual interface service.

#![allow(clippy::enum_variant_names)]

tonic::include_proto!("dxvif");
