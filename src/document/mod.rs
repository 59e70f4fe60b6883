/*!
 * Presentation document handling.
 *
 * - `package`: zip container access and relationship resolution
 * - `unit`: the `TextUnit` model and structural addresses
 * - `walker`: structural address computation
 * - `extractor`: document -> skeleton + ordered units
 * - `reinserter`: skeleton + units -> document
 */

pub mod extractor;
pub mod package;
pub mod reinserter;
pub mod unit;
pub mod walker;

pub use extractor::{ExtractOptions, ExtractedDocument, Extractor, Skeleton, SkeletonNode};
pub use package::Package;
pub use reinserter::Reinserter;
pub use unit::{RunFormatting, Scope, Step, StructuralAddress, TextUnit, UnitId, UnitState};
