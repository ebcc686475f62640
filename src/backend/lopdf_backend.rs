//! Primary extraction backend backed by `lopdf`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ::lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};
use image::{ExtendedColorType, ImageEncoder};

use crate::error::{Error, Result};
use crate::model::TableData;

use super::table_detector::StreamTableDetector;
use super::{ExtractedImage, ExtractionBackend, FileStamp, PageTextSource};

/// Concrete [`ExtractionBackend`] backed by `lopdf::Document`.
///
/// Page text comes from lopdf's text extraction, tables from a
/// [`StreamTableDetector`] run over that text, and images from the image
/// XObjects in each page's resource dictionary. The most recently loaded
/// document is cached by path, size and modification time, so the per-page
/// calls of one parse load the file once and a rewritten file is reloaded.
pub struct LopdfBackend {
    detector: StreamTableDetector,
    cache: Mutex<Option<(FileStamp, Arc<LopdfDocument>)>>,
}

impl LopdfBackend {
    /// Create a backend with the default table detector.
    pub fn new() -> Self {
        Self::with_detector(StreamTableDetector::new())
    }

    /// Create a backend with a custom table detector.
    pub fn with_detector(detector: StreamTableDetector) -> Self {
        Self {
            detector,
            cache: Mutex::new(None),
        }
    }

    fn document(&self, path: &Path) -> Result<Arc<LopdfDocument>> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::Other("lopdf document cache poisoned".into()))?;

        let stamp = FileStamp::of(path)?;
        if let Some((cached, doc)) = cache.as_ref() {
            if *cached == stamp {
                return Ok(Arc::clone(doc));
            }
        }

        log::debug!("LopdfBackend: loading {}", path.display());
        let doc = Arc::new(LopdfDocument::load(path)?);
        *cache = Some((stamp, Arc::clone(&doc)));
        Ok(doc)
    }

    fn page_id(doc: &LopdfDocument, page_index: u32) -> Result<ObjectId> {
        let pages = doc.get_pages();
        pages.get(&(page_index + 1)).copied().ok_or_else(|| {
            Error::PdfParse(format!(
                "Page {} is out of range (document has {} pages)",
                page_index + 1,
                pages.len()
            ))
        })
    }
}

impl Default for LopdfBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTextSource for LopdfBackend {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn page_count(&self, path: &Path) -> Result<u32> {
        Ok(self.document(path)?.get_pages().len() as u32)
    }

    fn extract_page_text(&self, path: &Path, page_index: u32) -> Result<String> {
        let doc = self.document(path)?;
        Self::page_id(&doc, page_index)?;
        doc.extract_text(&[page_index + 1])
            .map_err(|e| Error::extraction("text", page_index + 1, e))
    }
}

impl ExtractionBackend for LopdfBackend {
    fn table_method(&self) -> &str {
        "stream"
    }

    fn extract_page_tables(&self, path: &Path, page_index: u32) -> Result<Vec<TableData>> {
        let text = self.extract_page_text(path, page_index)?;
        Ok(self.detector.detect(&text))
    }

    fn extract_all_images(&self, path: &Path) -> Result<Vec<ExtractedImage>> {
        let doc = self.document(path)?;
        let mut images = Vec::new();

        for (page_num, page_id) in doc.get_pages() {
            for (name, obj_ref) in page_image_refs(&doc, page_id) {
                match extract_image(&doc, obj_ref) {
                    Some((data, extension)) => {
                        images.push(ExtractedImage::new(page_num - 1, data, extension));
                    }
                    None => log::debug!(
                        "LopdfBackend: skipping undecodable image {} on page {}",
                        name,
                        page_num
                    ),
                }
            }
        }

        log::debug!("LopdfBackend: {} images extracted", images.len());
        Ok(images)
    }
}

/// Resolve an object that may be a reference to a dictionary.
fn as_dictionary<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(r) => doc.get_dictionary(*r).ok(),
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

/// Image XObjects named in the page's resource dictionary, in dictionary order.
fn page_image_refs(doc: &LopdfDocument, page_id: ObjectId) -> Vec<(String, ObjectId)> {
    let Some(res_dict) = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Resources").ok())
        .and_then(|res| as_dictionary(doc, res))
    else {
        return vec![];
    };

    let Some(xobjects) = res_dict
        .get(b"XObject")
        .ok()
        .and_then(|x| as_dictionary(doc, x))
    else {
        return vec![];
    };

    xobjects
        .iter()
        .filter_map(|(name, obj)| {
            let obj_ref = obj.as_reference().ok()?;
            let is_image = doc
                .get_object(obj_ref)
                .ok()
                .and_then(|o| o.as_stream().ok())
                .and_then(|s| s.dict.get(b"Subtype").ok())
                .and_then(|s| s.as_name_str().ok())
                == Some("Image");
            is_image.then(|| (String::from_utf8_lossy(name).into_owned(), obj_ref))
        })
        .collect()
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name_str().ok().map(String::from))
            .collect(),
        _ => vec![],
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .ok()
        .and_then(|v| v.as_i64().ok())
        .and_then(|v| u32::try_from(v).ok())
}

/// Number of color components for the color spaces we can re-encode.
fn components(doc: &LopdfDocument, dict: &Dictionary) -> Option<u8> {
    let cs = dict.get(b"ColorSpace").ok()?;
    let cs = match cs {
        Object::Reference(r) => doc.get_object(*r).ok()?,
        other => other,
    };
    match cs {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" => Some(1),
            b"DeviceRGB" | b"CalRGB" => Some(3),
            _ => None,
        },
        // [/ICCBased <stream>] carries its component count as /N
        Object::Array(arr) if arr.first().and_then(|o| o.as_name_str().ok()) == Some("ICCBased") => {
            let stream = doc.get_object(arr.get(1)?.as_reference().ok()?).ok()?;
            match dict_u32(&stream.as_stream().ok()?.dict, b"N")? {
                1 => Some(1),
                3 => Some(3),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Extract one image XObject as (encoded bytes, extension).
fn extract_image(doc: &LopdfDocument, obj_ref: ObjectId) -> Option<(Vec<u8>, &'static str)> {
    let stream = doc.get_object(obj_ref).ok()?.as_stream().ok()?;
    let filters = filter_names(&stream.dict);

    match filters.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        // JPEG - data can be used directly
        ["DCTDecode"] => Some((stream.content.clone(), "jpg")),
        ["JPXDecode"] => Some((stream.content.clone(), "jp2")),
        [] | ["FlateDecode"] | ["LZWDecode"] => {
            encode_raw_samples(doc, stream).map(|png| (png, "png"))
        }
        _ => None,
    }
}

/// Re-encode 8-bit Gray/RGB raw samples as PNG.
fn encode_raw_samples(doc: &LopdfDocument, stream: &Stream) -> Option<Vec<u8>> {
    let width = dict_u32(&stream.dict, b"Width")?;
    let height = dict_u32(&stream.dict, b"Height")?;
    if dict_u32(&stream.dict, b"BitsPerComponent") != Some(8) {
        return None;
    }

    let (channels, color_type) = match components(doc, &stream.dict)? {
        1 => (1usize, ExtendedColorType::L8),
        _ => (3usize, ExtendedColorType::Rgb8),
    };

    let mut samples = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let expected = width as usize * height as usize * channels;
    if samples.len() < expected {
        return None;
    }
    samples.truncate(expected);

    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png)
        .write_image(&samples, width, height, color_type)
        .ok()?;
    Some(png)
}
