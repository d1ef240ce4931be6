//! Descriptor resolution and request-assembly emission for declarative REST
//! clients.
//!
//! Metadata records ([`meta`]) go in; [`MethodDescriptor`]s and
//! [`AssemblyProcedure`]s come out. Everything here is pure and synchronous:
//! the `#[rest_api]` macro runs it at compile time to report errors and the
//! runtime runs it again to drive request assembly.

pub mod cache;
pub mod classify;
pub mod descriptor;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod headers;
pub mod key;
pub mod meta;
pub mod shape;
pub mod template;

pub use cache::ProcedureCache;
pub use descriptor::{
    AuthorizationBinding, BodyDescriptor, DEFAULT_MULTIPART_BOUNDARY, DescriptorTable,
    HeaderCollectionBinding, HeaderEntry, HeaderParameterBinding, MethodDescriptor,
    MultipartDescriptor, ParameterDescriptor, ParameterRole, PartBinding, PathFragment,
    PropertyBinding, QueryBinding, build_descriptor, compile,
};
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, IgnoreDiagnostics, Severity};
pub use emit::{AssemblyProcedure, AssemblyStep, DispatchPlan, UriPlan, emit};
pub use error::DescriptorError;
pub use key::{MethodKey, ProcedureKey};
pub use shape::{DecodeTarget, ReturnDescriptor, ReturnShape};
