// src/schema/fields.rs

use super::types::{Column, SourceKind};
use super::types::FieldType::*;

/// Name of the object id attribute carried in exported GeoJSON.
pub const OBJECT_ID: &str = "OBJECTID";

pub const UTIL_STATUS: &str = "utilstatus";
pub const CUST_STATUS: &str = "custstatus";
pub const UTIL_SOURCE: &str = "utilsource";
pub const CUST_SOURCE: &str = "custsource";
pub const UTIL_NOTES: &str = "utilnotes";
pub const CUST_NOTES: &str = "custnotes";

/// The unified service-line class, in output order.
pub static UNIFIED_FIELDS: &[Column] = &[
    Column::new("accountid", Text),
    Column::new("address", Text),
    Column::new("location", Text),
    Column::new("sensitivepop", Text),
    Column::new("disadvantaged", Text),
    Column::new("utilassetid", Text),
    Column::new("utilmaterial", Text),
    Column::new("everlead", Text),
    Column::new("utilinstalldate", Date),
    Column::new("utildiameter", Double),
    Column::new(UTIL_SOURCE, Text),
    Column::new("utilverified", Text),
    Column::new("utilverifmethod", Text),
    Column::new("utilverifdate", Date),
    Column::new(UTIL_STATUS, Coded),
    Column::new(UTIL_NOTES, Text),
    Column::new("custassetid", Text),
    Column::new("custmaterial", Text),
    Column::new("custinstalldate", Date),
    Column::new("custdiameter", Double),
    Column::new(CUST_SOURCE, Text),
    Column::new("custverified", Text),
    Column::new("custverifmethod", Text),
    Column::new("custverifdate", Date),
    Column::new(CUST_STATUS, Coded),
    Column::new(CUST_NOTES, Text),
    Column::new("bothsidesstatus", Text),
    Column::new("leadconnector", Text),
    Column::new("leadsolder", Text),
    Column::new("otherfittings", Text),
    Column::new("buildingtype", Text),
    Column::new("pointofentry", Text),
    Column::new("copperwithlead", Text),
    Column::new("samplingsite", Text),
    Column::new("replacestatus", Text),
    Column::new("scheddate", Date),
    Column::new("utilreplacedate", Date),
    Column::new("custscheddate", Date),
    Column::new("custreplacedate", Date),
    Column::new("replacereason", Text),
    Column::new("custnotified", Text),
    Column::new("notifydate", Date),
    Column::new("yearstructbuilt", Integer),
];

/// (source field, unified field) pairs shared by every layer.
static COMMON_FIELD_MAP: &[(&str, &str)] = &[
    ("Account_ID", "accountid"),
    ("Other_Location_Identifier", "location"),
    ("Sensitive_Population", "sensitivepop"),
    ("Disadvantaged_Neighborhood", "disadvantaged"),
    ("Utility_Asset_ID", "utilassetid"),
    ("Utility_Material", "utilmaterial"),
    ("Ever_Lead_", "everlead"),
    ("Utility_Install_Date", "utilinstalldate"),
    ("Utility_Diameter", "utildiameter"),
    ("Utility_Source", UTIL_SOURCE),
    ("Utility_Side_Verified", "utilverified"),
    ("Utility_Verification_Method", "utilverifmethod"),
    ("Utility_Verification_Date", "utilverifdate"),
    ("Utility_Status", UTIL_STATUS),
    ("Utility_Side_Notes", UTIL_NOTES),
    ("Customer_Asset_ID", "custassetid"),
    ("Customer_Material", "custmaterial"),
    ("Customer_Install_Date", "custinstalldate"),
    ("Customer_Diameter", "custdiameter"),
    ("Customer_Source", CUST_SOURCE),
    ("Customer_Side_Verified", "custverified"),
    ("Customer_Verification_Method", "custverifmethod"),
    ("Customer_Verification_Date", "custverifdate"),
    ("Customer_Status", CUST_STATUS),
    ("Customer_Side_Notes", CUST_NOTES),
    ("Entire_Service_Line_Status", "bothsidesstatus"),
    ("Lead_Connector", "leadconnector"),
    ("Lead_Solder", "leadsolder"),
    ("Other_Fittings_Containing_Lead", "otherfittings"),
    ("Building_Type", "buildingtype"),
    ("Point_of_Entry_or_Point_of_Use", "pointofentry"),
    ("Copper_Pipes_with_Lead_Solder_Before_Lead_Ban", "copperwithlead"),
    ("Current_LCR_Sampling_Site", "samplingsite"),
    ("Replacement_Status", "replacestatus"),
    ("Utility_Side_Scheduled_Replacement_Date", "scheddate"),
    ("Utility_Side_Replacement_Date", "utilreplacedate"),
    ("Customer_Side_Scheduled_Replacement_Date", "custscheddate"),
    ("Customer_Side_Replacement_Date", "custreplacedate"),
    ("Reason_for_Replacement", "replacereason"),
    ("Notified_Customer", "custnotified"),
    ("Notification_Date", "notifydate"),
    ("Year_Structure_Built", "yearstructbuilt"),
];

impl SourceKind {
    /// Source field holding the street address.
    pub fn address_field(&self) -> &'static str {
        match self {
            SourceKind::Apartment => "Address",
            SourceKind::MobileHome | SourceKind::School => "Address_1",
        }
    }

    /// Full (source field, unified field) mapping for this layer.
    pub fn field_map(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        std::iter::once((self.address_field(), "address")).chain(COMMON_FIELD_MAP.iter().copied())
    }
}

/// Look up a unified column by name.
pub fn column(name: &str) -> Option<&'static Column> {
    UNIFIED_FIELDS.iter().find(|c| c.name == name)
}
