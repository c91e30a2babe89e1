//! Fixed extraction prompts, one per provider family.
//!
//! The response parser relies on the shape these prompts ask for, so they are
//! compile-time constants and never templated per request.

/// Dual-task prompt: structured data plus `box_2d` grounding.
pub const GROUNDED_EXTRACTION_PROMPT: &str = r#"You are a Visual Document Understanding engine.
Perform two tasks simultaneously:

TASK 1: Extract structured data (JSON)
Analyze the document and extract key fields into a hierarchical JSON structure under the key "structured_data".
(e.g., Invoice Number, Date, Line Items, Addresses).

TASK 2: Generate Bounding Boxes (Layout)
Identify the visual location of text blocks in the image. Return a list under the key "layout".
For each item in "layout", provide:
- "text": The text content.
- "box_2d": A list of 4 integers [ymin, xmin, ymax, xmax] representing the bounding box on a scale of 0 to 1000.

OUTPUT FORMAT:
Return ONLY valid JSON, with no markdown fences and no text before or after it, using this structure:
{
  "structured_data": {
      "...": "your extracted hierarchical data here"
  },
  "layout": [
      { "text": "Invoice", "box_2d": [10, 10, 50, 200] },
      { "text": "Total $500", "box_2d": [800, 500, 850, 600] }
  ]
}"#;

/// Shorter grounded prompt for models that drift on long instructions.
pub const COMPACT_GROUNDED_PROMPT: &str = r#"You are a Visual Extraction Engine. Perform two tasks:

1. "structured_data": Extract all text into hierarchical JSON.
2. "layout": Detect the visual bounding boxes of main text blocks.
   - Format: "box_2d": [ymin, xmin, ymax, xmax] on a scale of 0 to 1000.
   - Example: [0, 0, 1000, 1000] is the whole image.

Output ONLY valid JSON. No markdown, no commentary.
{
  "structured_data": { "...": "..." },
  "layout": [
      { "text": "Header", "box_2d": [10, 10, 50, 100] }
  ]
}"#;

/// Structure-only prompt. Asks for the same two keys so the parser sees one
/// shape, but grounding is not requested.
pub const STRUCTURED_EXTRACTION_PROMPT: &str = r#"Role: You are an advanced Document Structure & OCR Analysis Engine. Your goal is to extract all text from the provided image and restructure it into a strictly hierarchical JSON format that mirrors the visual layout and logical relationships of the document.

Core Instructions:
1. Analyze Layout: Before extracting, identify the document's structure. Recognize main headers, sub-headers, sections, tables, and key-value pairs.
2. Create Hierarchy:
    - Headers become parent keys.
    - Sub-headers become nested child keys.
    - Body text under a header becomes a string value or a list of strings if it is a bulleted list.
    - Tables must be converted into an array of objects, where column headers are keys.
    - Forms (Label: Value) must be converted into direct "Label": "Value" key-pairs.
3. Clean Output:
    - Return ONLY valid, parseable JSON.
    - Do not include markdown formatting (like ```json).
    - Do not include intro/outro text.
    - Standardize dates to YYYY-MM-DD and currency to 1234.56 format where possible.

JSON Structure Rules:
- Put the whole hierarchy under the top-level key "structured_data".
- Add a top-level key "layout" whose value is an empty list, or a list of {"text": "...", "box_2d": [ymin, xmin, ymax, xmax]} items on a 0 to 1000 scale if you can locate text blocks.
- If a section has no title, use a generic key like "section_1", "header_info", or "footer_info".
- Group related fields (e.g., an address block) into a single object: {"address": {"street": "...", "city": "..."}}.
- Handle checkboxes: If checked, return true; if unchecked, return false or null.

Example Input to Output Logic:
Input (Visual):
INVOICE Date: Jan 01, 2024 Bill To: John Doe 123 Main St Items:
Widget A - $10
Widget B - $20

Required Output (JSON):
{
  "structured_data": {
    "document_type": "invoice",
    "meta_data": {
      "date": "2024-01-01"
    },
    "sections": {
      "bill_to": {
        "name": "John Doe",
        "address": "123 Main St"
      },
      "line_items": [
        { "item_id": 1, "description": "Widget A", "price": 10.00 },
        { "item_id": 2, "description": "Widget B", "price": 20.00 }
      ]
    }
  },
  "layout": []
}
Task: Analyze the provided image and generate the hierarchical JSON now."#;
