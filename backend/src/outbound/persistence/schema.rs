//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Enumerations
//! are stored as lowercase `VARCHAR` values guarded by `CHECK` constraints;
//! money is stored as `BIGINT` cents.

diesel::table! {
    /// Registered accounts.
    users (id) {
        id -> Uuid,
        email -> Varchar,
        password_hash -> Varchar,
        full_name -> Varchar,
        role -> Varchar,
        is_verified -> Bool,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        last_login -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Archived password hashes, one row per password change.
    password_history (id) {
        id -> Uuid,
        user_id -> Uuid,
        password_hash -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Devices that completed login for a user.
    user_devices (id) {
        id -> Uuid,
        user_id -> Uuid,
        fingerprint -> Varchar,
        device_name -> Nullable<Varchar>,
        ip_address -> Nullable<Varchar>,
        user_agent -> Nullable<Varchar>,
        is_trusted -> Bool,
        created_at -> Timestamptz,
        last_used_at -> Timestamptz,
    }
}

diesel::table! {
    /// Personal details; the PII columns hold ciphertext.
    user_profiles (user_id) {
        user_id -> Uuid,
        first_name -> Nullable<Text>,
        last_name -> Nullable<Text>,
        date_of_birth -> Nullable<Text>,
        phone -> Nullable<Text>,
        address -> Nullable<Text>,
        medical_record_number -> Nullable<Text>,
        insurance_number -> Nullable<Text>,
        emergency_contact_name -> Nullable<Text>,
        emergency_contact_phone -> Nullable<Text>,
        blood_type -> Nullable<Varchar>,
        profile_picture_url -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Patient and doctor bookings.
    appointments (id) {
        id -> Uuid,
        patient_id -> Uuid,
        doctor_id -> Uuid,
        appointment_date -> Timestamptz,
        duration_minutes -> Int4,
        status -> Varchar,
        reason -> Text,
        notes -> Nullable<Text>,
        cancellation_reason -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Prescription headers.
    prescriptions (id) {
        id -> Uuid,
        prescription_number -> Varchar,
        patient_id -> Uuid,
        doctor_id -> Uuid,
        appointment_id -> Nullable<Uuid>,
        diagnosis -> Text,
        notes -> Nullable<Text>,
        status -> Varchar,
        issued_date -> Timestamptz,
        expiry_date -> Timestamptz,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Medication lines of a prescription.
    prescription_medications (id) {
        id -> Uuid,
        prescription_id -> Uuid,
        position -> Int4,
        medication_name -> Varchar,
        dosage -> Varchar,
        frequency -> Varchar,
        duration_days -> Int4,
        quantity -> Int4,
        refills_allowed -> Int4,
        refills_remaining -> Int4,
        instructions -> Nullable<Text>,
    }
}

diesel::table! {
    /// Secure messages; `content` holds ciphertext.
    messages (id) {
        id -> Uuid,
        sender_id -> Uuid,
        recipient_id -> Uuid,
        subject -> Nullable<Varchar>,
        content -> Text,
        is_read -> Bool,
        read_at -> Nullable<Timestamptz>,
        is_emergency -> Bool,
        parent_message_id -> Nullable<Uuid>,
        deleted_by_sender -> Bool,
        deleted_by_recipient -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Invoice headers with running totals.
    invoices (id) {
        id -> Uuid,
        invoice_number -> Varchar,
        patient_id -> Uuid,
        appointment_id -> Nullable<Uuid>,
        subtotal -> Int8,
        tax_amount -> Int8,
        discount_amount -> Int8,
        total_amount -> Int8,
        amount_paid -> Int8,
        balance_due -> Int8,
        status -> Varchar,
        issue_date -> Timestamptz,
        due_date -> Timestamptz,
        paid_date -> Nullable<Timestamptz>,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Billed lines of an invoice.
    invoice_items (id) {
        id -> Uuid,
        invoice_id -> Uuid,
        position -> Int4,
        description -> Varchar,
        quantity -> Int4,
        unit_price -> Int8,
        total_price -> Int8,
        service_code -> Nullable<Varchar>,
    }
}

diesel::table! {
    /// Payments applied to invoices.
    payments (id) {
        id -> Uuid,
        invoice_id -> Uuid,
        amount -> Int8,
        payment_method -> Varchar,
        payment_date -> Timestamptz,
        transaction_id -> Nullable<Varchar>,
        notes -> Nullable<Text>,
        processed_by -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only request audit trail.
    audit_logs (id) {
        id -> Uuid,
        user_id -> Nullable<Uuid>,
        action -> Varchar,
        resource -> Nullable<Varchar>,
        resource_id -> Nullable<Varchar>,
        ip_address -> Nullable<Varchar>,
        user_agent -> Nullable<Varchar>,
        details -> Nullable<Jsonb>,
        status -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(password_history -> users (user_id));
diesel::joinable!(user_devices -> users (user_id));
diesel::joinable!(user_profiles -> users (user_id));
diesel::joinable!(prescription_medications -> prescriptions (prescription_id));
diesel::joinable!(invoice_items -> invoices (invoice_id));
diesel::joinable!(payments -> invoices (invoice_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    password_history,
    user_devices,
    user_profiles,
    appointments,
    prescriptions,
    prescription_medications,
    messages,
    invoices,
    invoice_items,
    payments,
    audit_logs,
);
