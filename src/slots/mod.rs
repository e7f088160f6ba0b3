pub mod ad_sizes;
pub mod create;

pub use ad_sizes::{
    concat_size_mappings, format_sizes, parse_sizes, AdSize, AdSizeParseError, Device,
    SizeMapping,
};
pub use create::{create_ad_slot, CreateSlotOptions, SlotKind, AD_SLOT_ID_PREFIX};

use crate::core::dom::{self, Document, NodeId};

/// Wrapper element that placements insert into content around a slot.
pub fn create_slot_container(
    document: &Document,
    class_name: &str,
    slot: NodeId,
) -> dom::Result<NodeId> {
    let container = document.create_element("div");
    document.set_attribute(container, "class", class_name)?;
    document.append_child(container, slot)?;
    Ok(container)
}
