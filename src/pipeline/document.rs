//! Document rendering: embed the edge map in a one-page PDF with two captions.
//!
//! ## Layout
//!
//! The page is A4 portrait. Every coordinate below is a fixed constant in
//! PDF points (origin bottom-left), independent of the edge map's pixel
//! size:
//!
//! ```text
//!  y=800  caption_top            (Helvetica 12)
//!  y=700 ┌──────────────────────┐
//!        │  edge map 400 × 300  │  stretched to fit the box
//!  y=400 └──────────────────────┘
//!  y=380  caption_bottom         (Helvetica 12)
//!        x=100
//! ```
//!
//! Images whose aspect ratio differs from 4:3 are stretched, not letterboxed.
//!
//! ## Output location
//!
//! Each call writes to its own file `quilling_project_<random>.pdf` inside
//! the output directory, so concurrent invocations never overwrite each
//! other.

use crate::config::ProjectConfig;
use crate::error::QuillingError;
use image::GrayImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A4 portrait, in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
/// Left margin shared by both captions and the image.
pub const MARGIN_X: i64 = 100;
pub const CAPTION_TOP_Y: i64 = 800;
pub const CAPTION_BOTTOM_Y: i64 = 380;
pub const IMAGE_Y: i64 = 400;
/// Display box of the embedded image, in points.
pub const IMAGE_BOX: (i64, i64) = (400, 300);
pub const FONT_SIZE: i64 = 12;

const FILE_PREFIX: &str = "quilling_project_";

/// A serialised document and where it was written.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// Location of the PDF on disk.
    pub path: PathBuf,
    /// Full PDF bytes (identical to the file contents).
    pub bytes: Vec<u8>,
    /// Edge map PNG written next to the PDF, when requested.
    pub intermediate: Option<PathBuf>,
}

/// Page and image counts of a serialised PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DocumentSummary {
    pub pages: usize,
    pub images: usize,
}

/// Writes edge maps as one-page documents into a directory.
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    pub output_dir: PathBuf,
    pub keep_intermediate: bool,
}

impl DocumentRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            keep_intermediate: false,
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            keep_intermediate: config.keep_intermediate,
        }
    }

    /// Build the PDF and write it to a fresh file in `output_dir`.
    pub fn render(
        &self,
        edges: &GrayImage,
        caption_top: &str,
        caption_bottom: &str,
    ) -> Result<RenderedDocument, QuillingError> {
        let bytes = build_document(edges, caption_top, caption_bottom)?;

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            QuillingError::OutputWriteFailed {
                path: self.output_dir.clone(),
                source: e,
            }
        })?;

        let path = write_unique(&self.output_dir, &bytes)?;
        info!("Wrote {} ({} bytes)", path.display(), bytes.len());

        let intermediate = if self.keep_intermediate {
            Some(write_intermediate(&path, edges)?)
        } else {
            None
        };

        Ok(RenderedDocument {
            path,
            bytes,
            intermediate,
        })
    }

    /// Build the PDF and write it to exactly `path`, replacing any existing file.
    ///
    /// `output_dir` is ignored; the intermediate PNG, if requested, lands
    /// next to `path`.
    pub fn render_to(
        &self,
        edges: &GrayImage,
        caption_top: &str,
        caption_bottom: &str,
        path: &Path,
    ) -> Result<RenderedDocument, QuillingError> {
        let bytes = build_document(edges, caption_top, caption_bottom)?;
        persist_to(path, &bytes)?;
        info!("Wrote {} ({} bytes)", path.display(), bytes.len());

        let intermediate = if self.keep_intermediate {
            Some(write_intermediate(path, edges)?)
        } else {
            None
        };

        Ok(RenderedDocument {
            path: path.to_path_buf(),
            bytes,
            intermediate,
        })
    }
}

/// Render `edges` into a new document inside `output_dir`.
pub fn render_document(
    edges: &GrayImage,
    caption_top: &str,
    caption_bottom: &str,
    output_dir: &Path,
) -> Result<RenderedDocument, QuillingError> {
    DocumentRenderer::new(output_dir).render(edges, caption_top, caption_bottom)
}

fn write_failed(path: &Path) -> impl FnOnce(std::io::Error) -> QuillingError + '_ {
    move |source| QuillingError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    }
}

fn write_unique(dir: &Path, bytes: &[u8]) -> Result<PathBuf, QuillingError> {
    let mut file = tempfile::Builder::new()
        .prefix(FILE_PREFIX)
        .suffix(".pdf")
        .rand_bytes(8)
        .tempfile_in(dir)
        .map_err(write_failed(dir))?;

    file.write_all(bytes).map_err(write_failed(file.path()))?;
    file.flush().map_err(write_failed(file.path()))?;
    make_readable(file.path())?;

    let (_, path) = file.keep().map_err(|e| QuillingError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source: e.error,
    })?;
    Ok(path)
}

fn write_intermediate(pdf_path: &Path, edges: &GrayImage) -> Result<PathBuf, QuillingError> {
    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "quilling_project".to_string());
    let png_path = pdf_path.with_file_name(format!("{stem}_edges.png"));

    image::DynamicImage::ImageLuma8(edges.clone())
        .to_rgb8()
        .save(&png_path)
        .map_err(|e| QuillingError::OutputWriteFailed {
            path: png_path.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;
    debug!("Wrote intermediate {}", png_path.display());
    Ok(png_path)
}

/// Write `bytes` to exactly `path`, via a temp file and rename.
///
/// The temp file gets a random name in the target directory, so concurrent
/// writers to the same path never share it. The last rename wins.
pub fn persist_to(path: &Path, bytes: &[u8]) -> Result<(), QuillingError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_failed(path))?;

    let mut file = tempfile::NamedTempFile::new_in(parent).map_err(write_failed(path))?;
    file.write_all(bytes).map_err(write_failed(path))?;
    file.flush().map_err(write_failed(path))?;
    make_readable(file.path())?;

    file.persist(path)
        .map_err(|e| QuillingError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}

/// Mode for finished documents. Temp files are created 0600.
#[cfg(unix)]
const DOCUMENT_MODE: u32 = 0o644;

#[cfg(unix)]
fn make_readable(path: &Path) -> Result<(), QuillingError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(DOCUMENT_MODE))
        .map_err(write_failed(path))
}

#[cfg(not(unix))]
fn make_readable(_path: &Path) -> Result<(), QuillingError> {
    Ok(())
}

/// WinAnsi-compatible bytes for a caption; characters outside Latin-1 become `?`.
fn caption_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .filter(|c| !c.is_control())
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn text_ops(x: i64, y: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(caption_bytes(text))]),
        Operation::new("ET", vec![]),
    ]
}

/// Serialise a one-page PDF containing the captions and `edges`.
///
/// The edge map is stored as an 8-bit RGB image XObject.
pub fn build_document(
    edges: &GrayImage,
    caption_top: &str,
    caption_bottom: &str,
) -> Result<Vec<u8>, QuillingError> {
    if edges.width() == 0 || edges.height() == 0 {
        return Err(QuillingError::EmptyImage);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let rgb = image::DynamicImage::ImageLuma8(edges.clone()).to_rgb8();
    let image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(edges.width()),
            "Height" => i64::from(edges.height()),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    );
    let image_id = doc.add_object(image_stream);

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => dictionary! { "Im1" => image_id },
    });

    let (box_w, box_h) = IMAGE_BOX;
    let mut operations = text_ops(MARGIN_X, CAPTION_TOP_Y, caption_top);
    operations.extend([
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                box_w.into(),
                Object::Integer(0),
                Object::Integer(0),
                box_h.into(),
                MARGIN_X.into(),
                IMAGE_Y.into(),
            ],
        ),
        Operation::new("Do", vec!["Im1".into()]),
        Operation::new("Q", vec![]),
    ]);
    operations.extend(text_ops(MARGIN_X, CAPTION_BOTTOM_Y, caption_bottom));

    let content = Content { operations };
    let content_bytes = content
        .encode()
        .map_err(|e| QuillingError::DocumentEncoding {
            detail: e.to_string(),
        })?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => 1,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(PAGE_WIDTH),
            Object::Real(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| QuillingError::DocumentEncoding {
            detail: e.to_string(),
        })?;

    debug!(
        "Built document: {}x{} px image in {}x{} pt box, {} bytes",
        edges.width(),
        edges.height(),
        box_w,
        box_h,
        bytes.len()
    );
    Ok(bytes)
}

fn is_image(obj: &Object) -> bool {
    match obj {
        Object::Stream(stream) => {
            matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name.as_slice() == b"Image")
        }
        _ => false,
    }
}

/// Count pages and embedded images in a serialised PDF.
pub fn summarize(bytes: &[u8]) -> Result<DocumentSummary, QuillingError> {
    let doc = Document::load_mem(bytes).map_err(|e| QuillingError::DocumentEncoding {
        detail: e.to_string(),
    })?;
    let images = doc.objects.values().filter(|o| is_image(o)).count();
    Ok(DocumentSummary {
        pages: doc.get_pages().len(),
        images,
    })
}

/// Object id of the single page, for callers that want to inspect it.
pub fn first_page(doc: &Document) -> Option<ObjectId> {
    doc.get_pages().values().next().copied()
}
