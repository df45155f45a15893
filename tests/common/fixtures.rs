//! Service documents, products and result archives used by the integration tests

use reprocess_wps::ProductInfo;

/// Service capabilities advertising the `l2a` process
pub const CAPABILITIES: &str = include_str!("../fixtures/get_capabilities.xml");

/// Tile identifier of the reference product
pub const TILE: &str = "S2B_OPER_MSI_L1C_TL_MPS__20180222T110232_A005038_T35TNK_N02.06";

/// Folder entry opening every result archive
pub const PRODUCT_DIR: &str = "S2_EPA__l2a_20180305_3/";

/// Payload entry of the result archive
pub const PRODUCT_ENTRY: &str = "S2_EPA__l2a_20180305_3/S2A_MSIL2A_20180305T101021_N0206_R022_T32TQM.SAFE.zip";

/// File name the payload is unpacked to
pub const PRODUCT_FILE: &str = "S2A_MSIL2A_20180305T101021_N0206_R022_T32TQM.zip";

/// Metadata of an eligible Level-1C product
pub fn l1c_product() -> ProductInfo {
    [
        ("Satellite name", "Sentinel-2"),
        ("Product type", "S2MSI1C"),
        ("Level-1C PDI Identifier", TILE),
        ("Sensing stop", "2018-02-22T11:02:32.456Z"),
    ]
    .into_iter()
    .collect()
}

/// Execute response accepting the order, monitored at `status_location`
pub fn execute_accepted(status_location: &str) -> String {
    include_str!("../fixtures/l2a_execute_ok.xml").replace(
        "{{MONITOR}}?Id=789c558e4d4bc4301445ff4d76493d",
        &xml_escape(status_location),
    )
}

/// Status document for a running process at `percent`
pub fn status_started(percent: u32) -> String {
    status_document(&format!(
        r#"<wps:ProcessStarted percentCompleted="{percent}">Processing tile</wps:ProcessStarted>"#
    ))
}

/// Status document for a succeeded process whose result is at `result_url`
pub fn status_succeeded(result_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<wps:ExecuteResponse xmlns:wps="http://www.opengis.net/wps/1.0.0" xmlns:ows="http://www.opengis.net/ows/1.1" service="WPS" version="1.0.0">
    <wps:Status creationTime="1970-01-01T00:00:03Z">
        <wps:ProcessSucceeded>Process l2a successful</wps:ProcessSucceeded>
    </wps:Status>
    <wps:ProcessOutputs>
        <wps:Output>
            <ows:Identifier>OutputProduct</ows:Identifier>
            <wps:Data>
                <wps:LiteralData>{}</wps:LiteralData>
            </wps:Data>
        </wps:Output>
    </wps:ProcessOutputs>
</wps:ExecuteResponse>"#,
        xml_escape(result_url)
    )
}

fn status_document(status: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<wps:ExecuteResponse xmlns:wps="http://www.opengis.net/wps/1.0.0" service="WPS" version="1.0.0">
    <wps:Status creationTime="1970-01-01T00:00:02Z">{status}</wps:Status>
</wps:ExecuteResponse>"#
    )
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
}

/// Result archive: the product folder followed by the payload entry
pub fn result_archive(payload: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut dir = tar::Header::new_gnu();
    dir.set_entry_type(tar::EntryType::Directory);
    dir.set_size(0);
    dir.set_mode(0o755);
    builder
        .append_data(&mut dir, PRODUCT_DIR, std::io::empty())
        .expect("append folder entry");

    let mut file = tar::Header::new_gnu();
    file.set_size(payload.len() as u64);
    file.set_mode(0o644);
    builder
        .append_data(&mut file, PRODUCT_ENTRY, payload)
        .expect("append payload entry");

    builder.into_inner().expect("finish archive")
}
