//! Page-level concatenation of independent PDF documents.

use crate::error::ReportError;
use crate::pdf::{lopdf_err, page_ids_in_order};
use crate::pdfinspect::{INHERITABLE_PAGE_KEYS, inherited_attribute, load_source};
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, dictionary};

/// Concatenates the pages of `sources` in argument order. Each input is
/// parsed afresh, so the result shares no object with any caller buffer.
pub fn merge_documents(sources: &[&[u8]]) -> Result<Vec<u8>, ReportError> {
    if sources.is_empty() {
        return Err(ReportError::EmptyDocumentSet);
    }
    let docs = sources
        .iter()
        .enumerate()
        .map(|(index, bytes)| load_source(bytes, index))
        .collect::<Result<Vec<_>, _>>()?;
    let mut merged = merge_lopdf(docs)?;

    let mut out = Vec::new();
    merged.save_to(&mut out)?;
    Ok(out)
}

/// In-memory variant of [`merge_documents`] for already parsed inputs.
pub fn merge_lopdf(sources: Vec<LoDocument>) -> Result<LoDocument, ReportError> {
    if sources.is_empty() {
        return Err(ReportError::EmptyDocumentSet);
    }
    let source_count = sources.len();
    let mut merged = LoDocument::with_version("1.7");
    let mut page_ids: Vec<LoObjectId> = Vec::new();
    for (index, mut src) in sources.into_iter().enumerate() {
        if src.is_encrypted() {
            return Err(ReportError::MalformedSourceDocument {
                index,
                message: "encrypted documents are not supported".to_string(),
            });
        }
        materialize_inherited_attributes(&mut src);
        page_ids.extend(import_document_objects(&mut merged, src));
    }

    let pages_id = merged.new_object_id();
    for page_id in &page_ids {
        let page = merged
            .get_object_mut(*page_id)
            .and_then(LoObject::as_dict_mut)
            .map_err(lopdf_err)?;
        page.set("Parent", pages_id);
    }
    let kids: Vec<LoObject> = page_ids.iter().map(|id| LoObject::Reference(*id)).collect();
    merged.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    // Old catalogs, outlines and page-tree nodes are now unreachable.
    merged.prune_objects();
    merged.renumber_objects();
    merged.compress();

    tracing::debug!(
        sources = source_count,
        pages = page_ids.len(),
        "merged documents"
    );
    Ok(merged)
}

/// Copies attributes a page inherits from its ancestors onto the page
/// itself, so it renders the same once re-parented.
fn materialize_inherited_attributes(doc: &mut LoDocument) {
    for page_id in page_ids_in_order(doc) {
        let missing: Vec<(&[u8], LoObject)> = INHERITABLE_PAGE_KEYS
            .iter()
            .filter_map(|key| {
                let page = doc.get_object(page_id).and_then(LoObject::as_dict).ok()?;
                if page.has(key) {
                    return None;
                }
                inherited_attribute(doc, page_id, key).map(|value| (*key, value))
            })
            .collect();
        if missing.is_empty() {
            continue;
        }
        if let Ok(page) = doc.get_object_mut(page_id).and_then(LoObject::as_dict_mut) {
            for (key, value) in missing {
                page.set(key.to_vec(), value);
            }
        }
    }
}

/// Moves every object of `src` into `dst` under fresh ids and returns the
/// page ids of `src` in page order.
fn import_document_objects(dst: &mut LoDocument, mut src: LoDocument) -> Vec<LoObjectId> {
    let start_id = dst.max_id + 1;
    src.renumber_objects_with(start_id);
    let page_ids = page_ids_in_order(&src);
    if src.max_id > dst.max_id {
        dst.max_id = src.max_id;
    }
    dst.objects.extend(src.objects);
    page_ids
}
