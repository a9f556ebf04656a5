diesel::table! {
    devices (device_key) {
        device_key -> Text,           // stable hardware-derived identifier
        tenant_partition -> Text,     // fixed logical partition (single tenant)
        hostname -> Text,
        os_build -> Text,

        check_disk_encryption -> Bool,
        check_tpm -> Bool,
        check_secure_boot -> Bool,
        check_firewall -> Bool,
        check_antivirus -> Bool,
        is_compliant -> Bool,         // AND of all checks at last report

        last_seen -> Timestamp,

        enrollment_state -> Text,     // pending | enrolled
        enrollment_code -> Nullable<Text>,
        user_email -> Nullable<Text>,
        user_name -> Nullable<Text>,

        azure_ad_device_id -> Nullable<Text>,
        join_type -> Nullable<Text>,
    }
}
