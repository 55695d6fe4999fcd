use std::fs;
use std::io::{Cursor, Write};

use docqa::{extract_text, scan_files, DocumentIndex, IndexedChunk, DOCUMENT_FORMATS};
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn doc_exts() -> Vec<String> {
    DOCUMENT_FORMATS.split(',').map(str::to_string).collect()
}

fn zip_package(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, body) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
        .collect();
    let document = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{}</w:body></w:document>",
        body
    );
    zip_package(&[("word/document.xml", document.as_str())])
}

fn xlsx(rows: &[(&str, &str)]) -> Vec<u8> {
    let strings: Vec<&str> = rows.iter().flat_map(|(a, b)| [*a, *b]).collect();
    let shared: String = strings.iter().map(|s| format!("<si><t>{}</t></si>", s)).collect();
    let sheet_rows: String = rows
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let r = i + 1;
            format!(
                "<row r=\"{r}\"><c r=\"A{r}\" t=\"s\"><v>{}</v></c><c r=\"B{r}\" t=\"s\"><v>{}</v></c></row>",
                i * 2,
                i * 2 + 1
            )
        })
        .collect();
    let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
</Types>"#;
    let root_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;
    let workbook = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Labs" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;
    let workbook_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;
    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
        sheet_rows
    );
    let shared_strings = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{n}" uniqueCount="{n}">{}</sst>"#,
        shared,
        n = strings.len()
    );
    zip_package(&[
        ("[Content_Types].xml", content_types),
        ("_rels/.rels", root_rels),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", workbook_rels),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
        ("xl/sharedStrings.xml", shared_strings.as_str()),
    ])
}

#[test]
fn docx_paragraphs_are_extracted() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("discharge.docx");
    fs::write(&path, docx(&["Diagnosis: anemia", "Hemoglobin 9.8 g/dL"])).unwrap();

    let text = extract_text(&path).unwrap().expect("docx has an extractor");

    assert_eq!(text, "Diagnosis: anemia\nHemoglobin 9.8 g/dL\n");
}

#[test]
fn xlsx_cells_are_extracted() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("labs.xlsx");
    fs::write(&path, xlsx(&[("Glucose", "110 mg/dL"), ("Platelets", "250k")])).unwrap();

    let text = extract_text(&path).unwrap().expect("xlsx has an extractor");

    assert!(text.contains("Glucose\t110 mg/dL"));
    assert!(text.contains("Platelets\t250k"));
}

#[test]
fn corrupt_docx_is_an_extract_error() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("broken.docx");
    fs::write(&path, "not a zip").unwrap();

    assert!(matches!(extract_text(&path), Err(docqa::Error::Extract { .. })));
}

#[test]
fn scan_reads_text_reports_and_skips_the_rest() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("cbc.TXT"), "Hemoglobin 13.5 g/dL").unwrap();
    fs::write(tmp.path().join("blank.txt"), "  \n").unwrap();
    fs::write(tmp.path().join("labs.docx"), docx(&["Cholesterol 240 mg/dL"])).unwrap();
    fs::write(tmp.path().join("notes.md"), "markdown is not a report type").unwrap();
    fs::write(tmp.path().join("scan.png"), "image").unwrap();
    fs::write(tmp.path().join("huge.txt"), "x".repeat(8_000)).unwrap();

    let docs = scan_files(tmp.path(), &doc_exts(), 4_000);

    let mut found: Vec<(String, String)> = docs
        .iter()
        .map(|d| {
            let name = d.path.rsplit(['/', '\\']).next().unwrap().to_string();
            (name, d.text.trim().to_string())
        })
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec![
            ("cbc.TXT".to_string(), "Hemoglobin 13.5 g/dL".to_string()),
            ("labs.docx".to_string(), "Cholesterol 240 mg/dL".to_string()),
        ]
    );
}

#[test]
fn scan_of_missing_directory_is_empty() {
    let tmp = tempdir().unwrap();
    assert!(scan_files(&tmp.path().join("nope"), &doc_exts(), 1_000).is_empty());
}

#[test]
fn index_search_returns_best_chunks_first() {
    let chunk = |source: &str, vector: Vec<f32>| IndexedChunk {
        source: source.to_string(),
        text: format!("{} text", source),
        vector,
    };
    let index = DocumentIndex::new(vec![
        chunk("lipids.txt", vec![0.0, 1.0]),
        chunk("blood.txt", vec![1.0, 0.0]),
        chunk("mixed.txt", vec![1.0, 1.0]),
    ]);

    let hits = index.search(&[1.0, 0.2], 2);

    let sources: Vec<&str> = hits.iter().map(|h| h.source.as_str()).collect();
    assert_eq!(sources, vec!["blood.txt", "mixed.txt"]);
    assert!(hits[0].score > hits[1].score);
    assert!(DocumentIndex::default().search(&[1.0, 0.0], 3).is_empty());
}
