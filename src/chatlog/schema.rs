diesel::table! {
    users (id) {
        id -> Integer,
        name -> Text,
        email -> Text,
        profile_picture -> Text,
        is_ai_user -> Bool,
        persona_json -> Text,
        created_at -> BigInt,
    }
}

diesel::table! {
    chat_logs (id) {
        id -> Integer,
        user_id -> Integer,
        message -> Text,
        is_ai_response -> Bool,
        created_at -> BigInt,
    }
}

diesel::joinable!(chat_logs -> users (user_id));
diesel::allow_tables_to_appear_in_same_query!(users, chat_logs);
