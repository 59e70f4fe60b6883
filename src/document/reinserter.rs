/*!
 * Reinsertion of translated text.
 *
 * Pairs the skeleton's slots with the unit list in traversal order, checks
 * that every pair agrees on its structural address, and renders the parts
 * back into a new archive. Everything that is not a slot is written exactly
 * as it was read.
 */

use log::debug;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesText, Event};
use quick_xml::Writer;

use crate::errors::{AddressMismatchError, JobError};

use super::extractor::{PartBody, Skeleton, SkeletonNode};
use super::package::write_archive;
use super::unit::TextUnit;

/// Writes units back into their skeleton
pub struct Reinserter;

impl Reinserter {
    /// Produce the output document bytes.
    ///
    /// Every unit must be terminal. Failed units contribute their source text.
    /// Neither input is modified, so calling this twice yields the same bytes.
    pub fn reinsert(skeleton: &Skeleton, units: &[TextUnit]) -> Result<Vec<u8>, JobError> {
        let parts = Self::render_parts(skeleton, units)?;

        let entries = skeleton.entries().iter().zip(parts.iter()).map(|(entry, data)| {
            let bytes: &[u8] = match (&entry.body, data) {
                (_, Some(rendered)) => rendered.as_slice(),
                (PartBody::Raw(raw), None) => raw.as_slice(),
                (PartBody::Markup(_), None) => &[],
            };
            (&entry.meta, bytes)
        });

        write_archive(entries)
    }

    /// Render every markup part; `None` for parts kept raw.
    ///
    /// Parts are rendered in extraction order so slots and units pair up,
    /// and returned in archive order.
    pub fn render_parts(skeleton: &Skeleton, units: &[TextUnit]) -> Result<Vec<Option<Vec<u8>>>, JobError> {
        let mut remaining = units.iter();
        let mut rendered: Vec<Option<Vec<u8>>> = vec![None; skeleton.entries().len()];

        for &i in skeleton.traversal() {
            let entry = &skeleton.entries()[i];
            if let PartBody::Markup(nodes) = &entry.body {
                let bytes = render_part(&entry.meta.name, nodes, &mut remaining)?;
                rendered[i] = Some(bytes);
            }
        }

        if let Some(extra) = remaining.next() {
            return Err(AddressMismatchError {
                address: extra.address().to_string(),
                reason: "unit has no slot in the skeleton".to_string(),
            }
            .into());
        }

        debug!("Rendered {} units into {} parts", units.len(), skeleton.text_parts().len());
        Ok(rendered)
    }
}

fn render_part<'u>(
    part_name: &str,
    nodes: &[SkeletonNode],
    units: &mut impl Iterator<Item = &'u TextUnit>,
) -> Result<Vec<u8>, JobError> {
    let mut writer = Writer::new(Vec::new());

    for node in nodes {
        let event = match node {
            SkeletonNode::Markup(event) => event.borrow(),
            SkeletonNode::Slot(address) => {
                let unit = units.next().ok_or_else(|| AddressMismatchError {
                    address: address.to_string(),
                    reason: format!("slot in {} has no unit", part_name),
                })?;
                if unit.address() != address {
                    return Err(AddressMismatchError {
                        address: address.to_string(),
                        reason: format!("unit {} carries address {}", unit.id(), unit.address()),
                    }
                    .into());
                }
                let text = unit.resolved_text().ok_or_else(|| AddressMismatchError {
                    address: address.to_string(),
                    reason: format!("unit {} is still {}", unit.id(), unit.state().name()),
                })?;
                if text.is_empty() {
                    continue;
                }
                Event::Text(BytesText::from_escaped(partial_escape(text)))
            }
        };
        writer
            .write_event(event)
            .map_err(|e| JobError::Write(format!("{}: {}", part_name, e)))?;
    }

    Ok(writer.into_inner())
}
